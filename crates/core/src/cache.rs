//! Result caching keyed by a settings fingerprint.
//!
//! The solver never looks caches up on its own: a [`ModeCache`] is passed into
//! the solve call together with the [`Fingerprint`] of the request. Records
//! store complex arrays as separate real and imaginary parts so they can be
//! read by tools that only understand real numbers.

use std::{
    collections::{BTreeMap, HashMap},
    fs::{self, File},
    io::{BufReader, BufWriter, ErrorKind},
    path::{Path, PathBuf},
};

use num_complex::Complex64;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{
    classify::Classification,
    error::{SolverError, SolverResult},
    field::{Field2D, FieldComponent},
    mode::{Mode, ModeProfile, ModeSet, ScalarMode, SolverMethod, VectorMode},
    polarization::{ModeType, SemiComponent},
    recovery::VectorFields,
};

/// Hex digits of the SHA-256 digest kept in cache keys.
const KEY_LEN: usize = 16;

// ============================================================================
// Fingerprint
// ============================================================================

/// Canonical description of every parameter that influences a solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    prefix: String,
    settings: BTreeMap<String, Value>,
}

impl Fingerprint {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            settings: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.settings.insert(key.into(), canonical(value.into()));
    }

    pub fn extend(&mut self, other: &Fingerprint) {
        for (k, v) in &other.settings {
            self.settings.insert(k.clone(), v.clone());
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn settings(&self) -> &BTreeMap<String, Value> {
        &self.settings
    }

    pub fn canonical_json(&self) -> String {
        // BTreeMap keys serialize in sorted order.
        serde_json::to_string(&self.settings).unwrap_or_default()
    }

    pub fn key(&self) -> String {
        let digest = Sha256::digest(self.canonical_json().as_bytes());
        let mut key = hex::encode(digest);
        key.truncate(KEY_LEN);
        key
    }

    /// File-system friendly name: `<prefix>_<key>`.
    pub fn name(&self) -> String {
        format!("{}_{}", self.prefix, self.key())
    }
}

/// Floats are rounded to 12 significant digits: `0.1 + 0.2` and `0.3` share a
/// key.
fn canonical(value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .map(round_significant)
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::Null, Value::Number),
        Value::Array(items) => Value::Array(items.into_iter().map(canonical).collect()),
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, canonical(v))).collect())
        }
        other => other,
    }
}

fn round_significant(v: f64) -> f64 {
    if v == 0.0 {
        // folds -0.0 into 0.0
        return 0.0;
    }
    if !v.is_finite() {
        return v;
    }
    format!("{v:.11e}").parse().unwrap_or(v)
}

// ============================================================================
// Cache Trait
// ============================================================================

pub trait ModeCache: Send + Sync {
    /// `Ok(None)` on a miss; `Err(CacheCorruption)` when a record exists but
    /// cannot be decoded.
    fn get(&self, fingerprint: &Fingerprint) -> SolverResult<Option<ModeSet>>;

    fn put(&self, fingerprint: &Fingerprint, modes: &ModeSet) -> SolverResult<()>;
}

/// In-process cache, mostly useful for sweeps and tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, ModeSet>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ModeCache for MemoryCache {
    fn get(&self, fingerprint: &Fingerprint) -> SolverResult<Option<ModeSet>> {
        Ok(self.entries.lock().get(&fingerprint.key()).cloned())
    }

    fn put(&self, fingerprint: &Fingerprint, modes: &ModeSet) -> SolverResult<()> {
        self.entries.lock().insert(fingerprint.key(), modes.clone());
        Ok(())
    }
}

/// One JSON record per fingerprint, stored as `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirCache {
    dir: PathBuf,
}

impl JsonDirCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint.name()))
    }
}

impl ModeCache for JsonDirCache {
    fn get(&self, fingerprint: &Fingerprint) -> SolverResult<Option<ModeSet>> {
        let path = self.record_path(fingerprint);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record: CacheRecord = serde_json::from_reader(BufReader::new(file))
            .map_err(|err| SolverError::corrupt(format!("{}: {err}", path.display())))?;
        record.decode().map(Some)
    }

    fn put(&self, fingerprint: &Fingerprint, modes: &ModeSet) -> SolverResult<()> {
        fs::create_dir_all(&self.dir)?;
        let record = CacheRecord::encode(fingerprint, modes);
        let file = File::create(self.record_path(fingerprint))?;
        serde_json::to_writer(BufWriter::new(file), &record)?;
        Ok(())
    }
}

// ============================================================================
// Record Format
// ============================================================================

type ComponentRows = BTreeMap<String, Vec<Vec<f64>>>;

/// Serialized form of a [`ModeSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub method: SolverMethod,
    pub wavelength: f64,
    pub n_modes: usize,
    pub n_effs_real: Vec<f64>,
    pub n_effs_imag: Vec<f64>,
    pub modes_real: Vec<ComponentRows>,
    pub modes_imag: Vec<ComponentRows>,
    pub settings: BTreeMap<String, Value>,
    pub mode_types: Vec<(ModeType, f64)>,
    pub fraction_te: Vec<f64>,
    pub fraction_tm: Vec<f64>,
    #[serde(default)]
    pub energy_percentages: Vec<Vec<f64>>,
}

impl CacheRecord {
    pub fn encode(fingerprint: &Fingerprint, set: &ModeSet) -> Self {
        let n_effs = set.n_effs();
        let mut modes_real = Vec::with_capacity(set.len());
        let mut modes_imag = Vec::with_capacity(set.len());
        for mode in set {
            let mut re = ComponentRows::new();
            let mut im = ComponentRows::new();
            for component in mode.components() {
                if let Some(field) = mode.field(component) {
                    re.insert(component.to_string(), field.real_rows());
                    im.insert(component.to_string(), field.imag_rows());
                }
            }
            modes_real.push(re);
            modes_imag.push(im);
        }
        Self {
            method: set.method,
            wavelength: set.wavelength,
            n_modes: set.len(),
            n_effs_real: n_effs.iter().map(|n| n.re).collect(),
            n_effs_imag: n_effs.iter().map(|n| n.im).collect(),
            modes_real,
            modes_imag,
            settings: fingerprint.settings().clone(),
            mode_types: set.mode_types(),
            fraction_te: set.fraction_te(),
            fraction_tm: set.fraction_tm(),
            energy_percentages: set
                .modes()
                .iter()
                .map(|m| m.classification().energy_percentages.clone())
                .collect(),
        }
    }

    pub fn decode(self) -> SolverResult<ModeSet> {
        let n = self.n_modes;
        let lengths = [
            ("n_effs_real", self.n_effs_real.len()),
            ("n_effs_imag", self.n_effs_imag.len()),
            ("modes_real", self.modes_real.len()),
            ("modes_imag", self.modes_imag.len()),
            ("mode_types", self.mode_types.len()),
            ("fraction_te", self.fraction_te.len()),
            ("fraction_tm", self.fraction_tm.len()),
        ];
        if let Some((name, len)) = lengths.iter().find(|(_, len)| *len != n) {
            return Err(SolverError::corrupt(format!(
                "{name} has {len} entries but the record declares {n} modes"
            )));
        }
        if !self.energy_percentages.is_empty() && self.energy_percentages.len() != n {
            return Err(SolverError::corrupt(format!(
                "energy_percentages has {} entries but the record declares {n} modes",
                self.energy_percentages.len()
            )));
        }

        let mut modes = Vec::with_capacity(n);
        for idx in 0..n {
            let n_eff = Complex64::new(self.n_effs_real[idx], self.n_effs_imag[idx]);
            let (mode_type, percentage) = self.mode_types[idx];
            let fields = decode_fields(&self.modes_real[idx], &self.modes_imag[idx])?;
            let energy_percentages = self.energy_percentages.get(idx).cloned().unwrap_or_default();
            let classification = Classification {
                energy_percentages,
                fraction_te: self.fraction_te[idx],
                fraction_tm: self.fraction_tm[idx],
                mode_type,
                percentage,
            };
            let mode = match self.method {
                SolverMethod::Vectorial => {
                    let fields = vector_fields(fields, idx)?;
                    Mode::Vector(VectorMode::with_classification(n_eff, fields, classification))
                }
                SolverMethod::SemiVectorial => {
                    let (component, field) = scalar_component(fields, idx)?;
                    Mode::Scalar(ScalarMode::with_classification(
                        n_eff,
                        component,
                        field,
                        classification,
                    ))
                }
            };
            modes.push(mode);
        }
        Ok(ModeSet::new(self.method, self.wavelength, modes))
    }
}

fn decode_fields(
    real: &ComponentRows,
    imag: &ComponentRows,
) -> SolverResult<BTreeMap<FieldComponent, Field2D>> {
    if real.len() != imag.len() {
        return Err(SolverError::corrupt(format!(
            "{} real components but {} imaginary components",
            real.len(),
            imag.len()
        )));
    }
    let mut out = BTreeMap::new();
    for (name, re_rows) in real {
        let component: FieldComponent = name
            .parse()
            .map_err(|_| SolverError::corrupt(format!("unknown component '{name}'")))?;
        let im_rows = imag.get(name).ok_or_else(|| {
            SolverError::corrupt(format!("component {name} has no imaginary part"))
        })?;
        out.insert(component, Field2D::from_parts(re_rows, im_rows)?);
    }
    Ok(out)
}

fn vector_fields(
    mut fields: BTreeMap<FieldComponent, Field2D>,
    idx: usize,
) -> SolverResult<VectorFields> {
    let mut take = |c: FieldComponent| {
        fields
            .remove(&c)
            .ok_or_else(|| SolverError::corrupt(format!("mode {idx} is missing component {c}")))
    };
    let out = VectorFields {
        ex: take(FieldComponent::Ex)?,
        ey: take(FieldComponent::Ey)?,
        ez: take(FieldComponent::Ez)?,
        hx: take(FieldComponent::Hx)?,
        hy: take(FieldComponent::Hy)?,
        hz: take(FieldComponent::Hz)?,
    };
    let (nx, ny) = out.ex.shape();
    let cells_ok = [&out.ey, &out.ez, &out.hz].iter().all(|f| f.shape() == (nx, ny));
    let nodes_ok = [&out.hx, &out.hy].iter().all(|f| f.shape() == (nx + 1, ny + 1));
    if !(cells_ok && nodes_ok) || out.ex.is_empty() {
        return Err(SolverError::corrupt(format!(
            "mode {idx} has inconsistent field shapes"
        )));
    }
    Ok(out)
}

fn scalar_component(
    fields: BTreeMap<FieldComponent, Field2D>,
    idx: usize,
) -> SolverResult<(SemiComponent, Field2D)> {
    let mut iter = fields.into_iter();
    match (iter.next(), iter.next()) {
        (Some((FieldComponent::Ex, f)), None) if !f.is_empty() => Ok((SemiComponent::Ex, f)),
        (Some((FieldComponent::Ey, f)), None) if !f.is_empty() => Ok((SemiComponent::Ey, f)),
        _ => Err(SolverError::corrupt(format!(
            "semi-vectorial mode {idx} must hold exactly one non-empty Ex or Ey component"
        ))),
    }
}
