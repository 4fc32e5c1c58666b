//! Flat-text exports for plotting tools.
//!
//! All files are comma separated with a single `#` header line. Field dumps
//! hold the real part of one component, one line per y index.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{
    error::SolverResult,
    field::{Field2D, FieldComponent},
    group_index::GroupIndexResult,
    mode::{ModeProfile, ModeSet},
    sweep::SweepResult,
};

fn create(path: &Path) -> SolverResult<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// `<dir>/mode_info`: index, label, dominant-component percentage and n_eff.
pub fn write_mode_info(dir: &Path, set: &ModeSet) -> SolverResult<PathBuf> {
    let path = dir.join("mode_info");
    let mut out = create(&path)?;
    writeln!(out, "# Mode idx, Mode type, % in major direction, n_eff")?;
    for (idx, mode) in set.modes().iter().enumerate() {
        writeln!(
            out,
            "{idx},{},{:.2},{:.3}",
            mode.mode_type(),
            mode.percentage(),
            mode.n_eff().re
        )?;
    }
    out.flush()?;
    Ok(path)
}

/// Writes `<dir>/mode_<i>/<stem>_<component>_<i>.dat` for every mode and
/// every requested component the mode carries.
pub fn write_mode_fields(
    dir: &Path,
    stem: &str,
    set: &ModeSet,
    components: &[FieldComponent],
) -> SolverResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (idx, mode) in set.modes().iter().enumerate() {
        let mode_dir = dir.join(format!("mode_{idx}"));
        for &component in components {
            let Some(field) = mode.field(component) else {
                continue;
            };
            let path = mode_dir.join(format!("{stem}_{component}_{idx}.dat"));
            write_field(&path, field)?;
            written.push(path);
        }
    }
    Ok(written)
}

pub fn write_field(path: &Path, field: &Field2D) -> SolverResult<()> {
    let mut out = create(path)?;
    for row in field.real_rows() {
        let line: Vec<String> = row.iter().map(|v| format!("{v:.6e}")).collect();
        writeln!(out, "{}", line.join(","))?;
    }
    out.flush()?;
    Ok(())
}

/// `<dir>/_ng_<name>_<wavelength>_<step>.dat`.
pub fn write_group_index(
    dir: &Path,
    name: &str,
    result: &GroupIndexResult,
) -> SolverResult<PathBuf> {
    let path = dir.join(format!(
        "_ng_{name}_{}_{}.dat",
        result.wavelength, result.step
    ));
    let mut out = create(&path)?;
    writeln!(out, "# Mode idx, Group index")?;
    for (idx, ng) in result.group_indices.iter().enumerate() {
        writeln!(out, "{idx},{ng:.3}")?;
    }
    out.flush()?;
    Ok(path)
}

/// File stem for a sweep: `<name>_<first>_<last>_<count>` with the end points
/// in thousandths of the parameter unit.
pub fn sweep_stem(name: &str, params: &[f64]) -> String {
    let milli = |v: Option<&f64>| v.map_or(0, |v| (v * 1e3).round() as i64);
    format!(
        "{name}_{}_{}_{}",
        milli(params.first()),
        milli(params.last()),
        params.len()
    )
}

/// Writes the `_neffs`, `_mode_types`, `_fraction_te` and `_fraction_tm`
/// tables of a sweep.
pub fn write_sweep(dir: &Path, name: &str, result: &SweepResult) -> SolverResult<[PathBuf; 4]> {
    let stem = sweep_stem(name, &result.params);
    let paths = [
        dir.join(format!("{stem}_neffs.dat")),
        dir.join(format!("{stem}_mode_types.dat")),
        dir.join(format!("{stem}_fraction_te.dat")),
        dir.join(format!("{stem}_fraction_tm.dat")),
    ];

    write_param_table(&paths[0], "n_eff", &result.params, &result.n_effs, 6)?;

    let mut out = create(&paths[1])?;
    let modes = result.mode_types.first().map_or(0, Vec::len);
    let header: Vec<String> = (0..modes).map(|i| format!("Mode{i}")).collect();
    writeln!(out, "# {}", header.join(","))?;
    for row in &result.mode_types {
        let line: Vec<String> = row.iter().map(|(t, pct)| format!("{t} {pct}")).collect();
        writeln!(out, "{}", line.join(","))?;
    }
    out.flush()?;

    write_param_table(&paths[2], "fraction te", &result.params, &result.fraction_te, 2)?;
    write_param_table(&paths[3], "fraction tm", &result.params, &result.fraction_tm, 2)?;
    Ok(paths)
}

fn write_param_table(
    path: &Path,
    label: &str,
    params: &[f64],
    rows: &[Vec<f64>],
    precision: usize,
) -> SolverResult<()> {
    let mut out = create(path)?;
    writeln!(out, "# param sweep,{label}")?;
    for (param, row) in params.iter().zip(rows) {
        let values: Vec<String> = row.iter().map(|v| format!("{v:.precision$}")).collect();
        writeln!(out, "{param:.6},{}", values.join(","))?;
    }
    out.flush()?;
    Ok(())
}
