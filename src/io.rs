//! Safetensors I/O for trials, TGMs and the output bundles.
//!
//! Tensor names follow the fields of the bundles they store:
//!
//! | bundle            | tensors                                                        |
//! |-------------------|----------------------------------------------------------------|
//! | trials (input)    | `trial_N` [C,T], `time` [T], `sfreq` [1], `label` [N] I32, `ch_names` U8 |
//! | warping source    | `phase_N` [T], optional `ged_phase_N` [T], optional `waveshape` [L] |
//! | TGM (input)       | `tgm` [n,n]                                                    |
//! | warped            | trials layout + `warp_freq`, `n_cycles`, `cycle_dur`, `phase_window`, `component_removed`, `warnings` |
//! | quantification    | `acmap`, `peaks_amp`, `peaks_freq`, `spectrum`, `f`            |
//! | permutation       | `empspec` [1,F], `shuffspec` [P,F], `f`, `p`, optional `ci_lower`/`ci_upper` |
//! | group             | `empspec`, `shuffspec`, `f`, `p`, `p_corrected`, optional CI   |
use anyhow::{bail, Context, Result};
use ndarray::Array2;
use std::collections::HashMap;
use std::path::Path;

use crate::quantify::Quantification;
use crate::stats::{ConfidenceInterval, GroupResult, PermutationResult};
use crate::trial::{Label, Trial, TrialSet};
use crate::warp::WarpedData;

/// Parsed JSON header: tensor name → `{dtype, shape, data_offsets}`.
type Header = HashMap<String, serde_json::Value>;

/// Element types found in the bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dtype {
    F32,
    F64,
    I32,
    U8,
}

impl Dtype {
    fn name(self) -> &'static str {
        match self {
            Dtype::F32 => "F32",
            Dtype::F64 => "F64",
            Dtype::I32 => "I32",
            Dtype::U8 => "U8",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        [Dtype::F32, Dtype::F64, Dtype::I32, Dtype::U8]
            .into_iter()
            .find(|d| d.name() == name)
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Split a file into its header and the offset where tensor data begins.
fn split_header(bytes: &[u8]) -> Result<(Header, usize)> {
    let (len, rest) = bytes
        .split_first_chunk::<8>()
        .context("safetensors file too small")?;
    let n = usize::try_from(u64::from_le_bytes(*len))?;
    let json = rest.get(..n).context("safetensors header length exceeds file size")?;
    let header = serde_json::from_slice(json).context("failed to parse safetensors header")?;
    Ok((header, 8 + n))
}

fn offsets_of(entry: &serde_json::Value) -> Result<(usize, usize)> {
    let offsets = entry["data_offsets"].as_array().context("missing data_offsets")?;
    match offsets.as_slice() {
        [s, e] => Ok((
            s.as_u64().context("bad data_offsets")? as usize,
            e.as_u64().context("bad data_offsets")? as usize,
        )),
        _ => bail!("data_offsets must have two entries"),
    }
}

fn shape_of(entry: &serde_json::Value) -> Result<Vec<usize>> {
    entry["shape"]
        .as_array()
        .context("missing shape")?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize).context("bad shape entry"))
        .collect()
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// A safetensors file held in memory; tensors are decoded on request.
pub struct StReader {
    bytes: Vec<u8>,
    header: Header,
    data_start: usize,
}

impl StReader {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let (header, data_start) = split_header(&bytes)?;
        Ok(Self { bytes, header, data_start })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.header.contains_key(name)
    }

    fn raw(&self, name: &str) -> Result<(&[u8], Dtype, Vec<usize>)> {
        let entry = self.header.get(name).with_context(|| format!("missing '{name}' tensor"))?;
        let (s, e) = offsets_of(entry)?;
        let raw = self
            .bytes
            .get(self.data_start + s..self.data_start + e)
            .with_context(|| format!("'{name}' data out of bounds"))?;
        let dtype = entry["dtype"].as_str().context("missing dtype")?;
        let dtype = Dtype::parse(dtype).with_context(|| format!("'{name}': unsupported dtype {dtype}"))?;
        Ok((raw, dtype, shape_of(entry)?))
    }

    /// Any numeric tensor converted to f64, with its shape.
    pub fn f64_tensor(&self, name: &str) -> Result<(Vec<f64>, Vec<usize>)> {
        let (raw, dtype, shape) = self.raw(name)?;
        let vals: Vec<f64> = match dtype {
            Dtype::F32 => raw.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            Dtype::F64 => raw.chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
            Dtype::I32 => raw.chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            Dtype::U8 => raw.iter().map(|&b| b as f64).collect(),
        };
        Ok((vals, shape))
    }

    pub fn vec(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self.f64_tensor(name)?.0)
    }

    pub fn scalar(&self, name: &str) -> Result<f64> {
        self.vec(name)?.first().copied().with_context(|| format!("'{name}' is empty"))
    }

    pub fn array2(&self, name: &str) -> Result<Array2<f64>> {
        let (vals, shape) = self.f64_tensor(name)?;
        let &[r, c] = shape.as_slice() else {
            bail!("'{name}': expected 2-D tensor, got shape {shape:?}");
        };
        Ok(Array2::from_shape_vec((r, c), vals)?)
    }

    /// Newline-separated strings stored as U8.
    pub fn strings(&self, name: &str) -> Result<Vec<String>> {
        let (raw, _, _) = self.raw(name)?;
        Ok(std::str::from_utf8(raw)?
            .split('\n')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect())
    }

    /// Tensors `{prefix}0`, `{prefix}1`, ... up to the first missing index.
    pub fn indexed(&self, prefix: &str) -> Vec<String> {
        (0..)
            .map(|i| format!("{prefix}{i}"))
            .take_while(|n| self.contains(n))
            .collect()
    }
}

// ── Bundle builder ───────────────────────────────────────────────────────────

struct Entry {
    name: String,
    dtype: Dtype,
    shape: Vec<usize>,
    bytes: Vec<u8>,
}

/// Named tensors collected for one output bundle, written as safetensors.
///
/// ```rust,no_run
/// use braintime::io::Bundle;
/// use std::path::Path;
/// let mut b = Bundle::default();
/// b.vector("f", &[1.0, 2.0, 3.0]);
/// b.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct Bundle {
    entries: Vec<Entry>,
}

impl Bundle {
    fn push(&mut self, name: &str, dtype: Dtype, shape: Vec<usize>, bytes: Vec<u8>) {
        self.entries.push(Entry { name: name.to_string(), dtype, shape, bytes });
    }

    /// F64 tensor of any shape.
    pub fn tensor(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(name, Dtype::F64, shape.to_vec(), bytes);
    }

    pub fn vector(&mut self, name: &str, data: &[f64]) {
        self.tensor(name, data, &[data.len()]);
    }

    pub fn matrix(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.tensor(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn scalar(&mut self, name: &str, v: f64) {
        self.tensor(name, &[v], &[1]);
    }

    pub fn ints(&mut self, name: &str, data: &[i32]) {
        let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(name, Dtype::I32, vec![data.len()], bytes);
    }

    /// Newline-joined strings as a U8 tensor.
    pub fn strings(&mut self, name: &str, items: &[String]) {
        let bytes = items.join("\n").into_bytes();
        self.push(name, Dtype::U8, vec![bytes.len()], bytes);
    }

    /// Serialized file: header length, space-padded JSON header, tensor data.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut header = serde_json::Map::new();
        let mut offset = 0usize;
        for e in &self.entries {
            let end = offset + e.bytes.len();
            header.insert(
                e.name.clone(),
                serde_json::json!({
                    "dtype": e.dtype.name(),
                    "shape": e.shape,
                    "data_offsets": [offset, end],
                }),
            );
            offset = end;
        }
        let mut json = serde_json::to_vec(&header)?;
        // Tensor data starts on an 8-byte boundary.
        json.resize(json.len().next_multiple_of(8), b' ');

        let mut out = Vec::with_capacity(8 + json.len() + offset);
        out.extend_from_slice(&(json.len() as u64).to_le_bytes());
        out.extend_from_slice(&json);
        for e in &self.entries {
            out.extend_from_slice(&e.bytes);
        }
        Ok(out)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?).with_context(|| format!("writing {}", path.display()))
    }
}

// ── Inputs ────────────────────────────────────────────────────────────────────

/// Load `trial_N`, `time`, `sfreq`, optional `label` and `ch_names`.
pub fn load_trials(r: &StReader) -> Result<TrialSet> {
    let names = r.indexed("trial_");
    if names.is_empty() {
        bail!("no trial_0 tensor");
    }
    let time = r.vec("time")?;
    let sfreq = r.scalar("sfreq")?;
    let labels: Vec<Label> = if r.contains("label") {
        r.vec("label")?.into_iter().map(|v| v as Label).collect()
    } else {
        vec![0; names.len()]
    };
    if labels.len() != names.len() {
        bail!("{} labels for {} trials", labels.len(), names.len());
    }

    let mut trials = Vec::with_capacity(names.len());
    for (name, &label) in names.iter().zip(&labels) {
        let data = r.array2(name)?;
        trials.push(Trial::new(data, time.clone(), label).with_context(|| name.clone())?);
    }
    let n_ch = trials[0].data.nrows();
    let channels = if r.contains("ch_names") {
        r.strings("ch_names")?
    } else {
        (0..n_ch).map(|c| format!("ch{c}")).collect()
    };
    Ok(TrialSet::new(trials, sfreq, channels)?)
}

/// Rows `{prefix}0`, `{prefix}1`, ... (e.g. `phase_`), or `None` if absent.
pub fn load_rows(r: &StReader, prefix: &str) -> Result<Option<Vec<Vec<f64>>>> {
    let names = r.indexed(prefix);
    if names.is_empty() {
        return Ok(None);
    }
    Ok(Some(names.iter().map(|n| r.vec(n)).collect::<Result<_>>()?))
}

// ── Output bundles ────────────────────────────────────────────────────────────

fn add_trials(w: &mut Bundle, trials: &[Trial], time: &[f64], sfreq: f64, channels: &[String]) {
    for (i, t) in trials.iter().enumerate() {
        w.matrix(&format!("trial_{i}"), &t.data);
    }
    let labels: Vec<i32> = trials.iter().map(|t| t.label() as i32).collect();
    w.ints("label", &labels);
    w.vector("time", time);
    w.scalar("sfreq", sfreq);
    w.strings("ch_names", channels);
}

fn add_ci(w: &mut Bundle, ci: Option<ConfidenceInterval>) {
    if let Some(ci) = ci {
        w.vector("ci_lower", &ci.lower);
        w.vector("ci_upper", &ci.upper);
    }
}

pub fn save_warped(out: &WarpedData, path: &Path) -> Result<()> {
    let mut w = Bundle::default();
    add_trials(&mut w, &out.trials, &out.time, out.sfreq, &out.channels);
    w.scalar("warp_freq", out.warp_freq);
    w.scalar("n_cycles", out.n_cycles);
    w.ints("cycle_dur", &[out.cycle_dur as i32]);
    w.vector("phase_window", &[out.phase_window.0, out.phase_window.1]);
    w.ints("component_removed", &[out.component_removed as i32]);
    let warnings: Vec<String> = out.diagnostics.warnings().iter().map(|w| w.to_string()).collect();
    if !warnings.is_empty() {
        w.strings("warnings", &warnings);
    }
    w.write(path)
}

pub fn save_quantification(q: &Quantification, path: &Path) -> Result<()> {
    let mut w = Bundle::default();
    w.matrix("acmap", &q.ac_map);
    w.vector("peaks_amp", &q.peak_amplitudes());
    w.vector("peaks_freq", &q.peak_freqs());
    w.vector("spectrum", &q.mean_spectrum.power);
    w.vector("f", q.freqs());
    w.write(path)
}

pub fn save_permutation(r: &PermutationResult, path: &Path) -> Result<()> {
    let mut w = Bundle::default();
    let bins = r.empirical.len();
    w.tensor("empspec", &r.empirical.to_vec(), &[1, bins]);
    w.matrix("shuffspec", &r.null);
    w.vector("f", &r.freqs);
    w.vector("p", &r.p_values());
    add_ci(&mut w, r.confidence_interval());
    w.write(path)
}

pub fn save_group(g: &GroupResult, path: &Path) -> Result<()> {
    let mut w = Bundle::default();
    let bins = g.empirical.len();
    w.tensor("empspec", &g.empirical.to_vec(), &[1, bins]);
    w.matrix("shuffspec", &g.null);
    w.vector("f", &g.freqs);
    w.vector("p", &g.p_values);
    w.vector("p_corrected", &g.p_values_corrected);
    add_ci(&mut w, g.confidence_interval());
    w.write(path)
}
