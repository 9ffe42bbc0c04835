//! Safetensors I/O for the command-line tools.
//!
//! Reader: loads a `data` tensor (`[C, T]`, F32 or F64) and an optional
//! `sfreq` scalar. Writer: [`StWriter`] collects named tensors and writes one
//! file. Both speak the plain container format (8-byte little-endian header
//! length, JSON header, packed little-endian payload) over `serde_json`.
use anyhow::{anyhow, bail, ensure, Context, Result};
use ndarray::Array2;
use std::collections::HashMap;
use std::path::Path;

// ── Low-level parser ──────────────────────────────────────────────────────────

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, serde_json::Value>, usize)> {
    ensure!(bytes.len() >= 8, "safetensors file too small");
    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[..8]);
    let n = u64::from_le_bytes(len) as usize;
    ensure!(bytes.len() >= 8 + n, "truncated safetensors header");
    let header: HashMap<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..8 + n]).context("failed to parse safetensors header")?;
    Ok((header, 8 + n))
}

/// Tensor entry resolved against the payload.
struct Entry<'a> {
    dtype: &'a str,
    shape: Vec<usize>,
    raw: &'a [u8],
}

fn entry<'a>(bytes: &'a [u8], data_start: usize, name: &str, val: &'a serde_json::Value) -> Result<Entry<'a>> {
    let dtype = val["dtype"].as_str().ok_or_else(|| anyhow!("'{name}': missing dtype"))?;
    let shape = val["shape"]
        .as_array()
        .ok_or_else(|| anyhow!("'{name}': missing shape"))?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| anyhow!("'{name}': non-integer shape"))?;
    let offsets = val["data_offsets"]
        .as_array()
        .filter(|o| o.len() == 2)
        .ok_or_else(|| anyhow!("'{name}': missing data_offsets"))?;
    let (s, e) = match (offsets[0].as_u64(), offsets[1].as_u64()) {
        (Some(s), Some(e)) if s <= e => (s as usize, e as usize),
        _ => bail!("'{name}': bad data_offsets"),
    };
    let raw = bytes
        .get(data_start + s..data_start + e)
        .ok_or_else(|| anyhow!("'{name}': data_offsets past end of file"))?;
    Ok(Entry { dtype, shape, raw })
}

/// Owned tensor waiting to be written.
struct Tensor {
    name: String,
    dtype: &'static str,
    shape: Vec<usize>,
    raw: Vec<u8>,
}

/// Inverse of [`parse_header`] + [`entry`]: header length, JSON header padded
/// with spaces to a multiple of 8, then the payloads back to back in order.
fn encode(tensors: &[Tensor]) -> Result<Vec<u8>> {
    let mut header = serde_json::Map::new();
    let mut offset = 0usize;
    for t in tensors {
        ensure!(!header.contains_key(&t.name), "duplicate tensor name '{}'", t.name);
        let end = offset + t.raw.len();
        header.insert(
            t.name.clone(),
            serde_json::json!({ "dtype": t.dtype, "shape": t.shape, "data_offsets": [offset, end] }),
        );
        offset = end;
    }
    let mut head = serde_json::to_vec(&header)?;
    head.resize(head.len().next_multiple_of(8), b' ');

    let mut out = Vec::with_capacity(8 + head.len() + offset);
    out.extend_from_slice(&(head.len() as u64).to_le_bytes());
    out.extend_from_slice(&head);
    for t in tensors {
        out.extend_from_slice(&t.raw);
    }
    Ok(out)
}

fn decode_f32(raw: &[u8]) -> Vec<f32> {
    raw.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn decode_f64(raw: &[u8]) -> Vec<f64> {
    raw.chunks_exact(8)
        .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .collect()
}

// ── Public structs ────────────────────────────────────────────────────────────

/// A `[C, T]` signal in its on-disk precision.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    F32(Array2<f32>),
    F64(Array2<f64>),
}

impl Signal {
    pub fn dim(&self) -> (usize, usize) {
        match self {
            Signal::F32(a) => a.dim(),
            Signal::F64(a) => a.dim(),
        }
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            Signal::F32(_) => "F32",
            Signal::F64(_) => "F64",
        }
    }
}

/// Recording loaded from a safetensors file.
pub struct SignalFile {
    /// `[C, T]` samples, one row per electrode.
    pub data: Signal,
    /// Sampling rate (Hz), when the file carries one.
    pub sfreq: Option<f64>,
}

impl SignalFile {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let (header, data_start) = parse_header(&bytes)?;

        let data_val = header.get("data").context("missing 'data' key")?;
        let data = entry(&bytes, data_start, "data", data_val)?;
        let &[n_ch, n_t] = data.shape.as_slice() else {
            bail!("'data' must be 2-D [channels, samples], got shape {:?}", data.shape);
        };
        let data = match data.dtype {
            "F32" => Signal::F32(Array2::from_shape_vec((n_ch, n_t), decode_f32(data.raw))?),
            "F64" => Signal::F64(Array2::from_shape_vec((n_ch, n_t), decode_f64(data.raw))?),
            other => bail!("'data' has unsupported dtype {other} (expected F32 or F64)"),
        };

        // Sampling rate is optional.
        let sfreq = match header.get("sfreq") {
            Some(val) => {
                let e = entry(&bytes, data_start, "sfreq", val)?;
                let v = match e.dtype {
                    "F32" => decode_f32(e.raw).first().map(|&v| v as f64),
                    "F64" => decode_f64(e.raw).first().copied(),
                    other => bail!("'sfreq' has unsupported dtype {other}"),
                };
                Some(v.context("'sfreq' is empty")?)
            }
            None => None,
        };

        Ok(SignalFile { data, sfreq })
    }
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Collects named F32, F64 and I32 tensors and writes them as one file.
///
/// ```rust,no_run
/// use eegcond::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("signal", &[1.0f32, 2.0, 3.0], &[1, 3]);
/// w.add_f64("sfreq", &[1000.0], &[1]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    tensors: Vec<Tensor>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, dtype: &'static str, shape: &[usize], raw: Vec<u8>) {
        self.tensors.push(Tensor { name: name.to_string(), dtype, shape: shape.to_vec(), raw });
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        self.push(name, "F32", shape, data.iter().flat_map(|v| v.to_le_bytes()).collect());
    }

    pub fn add_f32_arr2(&mut self, name: &str, arr: &Array2<f32>) {
        self.push(name, "F32", arr.shape(), arr.iter().flat_map(|v| v.to_le_bytes()).collect());
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        self.push(name, "F64", shape, data.iter().flat_map(|v| v.to_le_bytes()).collect());
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        self.push(name, "F64", arr.shape(), arr.iter().flat_map(|v| v.to_le_bytes()).collect());
    }

    pub fn add_signal(&mut self, name: &str, signal: &Signal) {
        match signal {
            Signal::F32(a) => self.add_f32_arr2(name, a),
            Signal::F64(a) => self.add_f64_arr2(name, a),
        }
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        self.push(name, "I32", shape, data.iter().flat_map(|v| v.to_le_bytes()).collect());
    }

    /// Channel index list as a 1-D I32 tensor.
    pub fn add_indices(&mut self, name: &str, indices: &[usize]) {
        let data: Vec<i32> = indices.iter().map(|&i| i as i32).collect();
        self.add_i32(name, &data, &[data.len()]);
    }

    /// Serialised file contents.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(&self.tensors)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_header_is_aligned_and_offsets_are_packed() {
        let mut w = StWriter::new();
        w.add_f32("a", &[1.0, 2.0, 3.0], &[3]);
        w.add_f64("b", &[-0.5], &[1, 1]);
        w.add_indices("c", &[7, 9]);
        let bytes = w.to_bytes().unwrap();

        let (header, data_start) = parse_header(&bytes).unwrap();
        assert_eq!((data_start - 8) % 8, 0);
        assert_eq!(bytes.len(), data_start + 12 + 8 + 8);

        let a = entry(&bytes, data_start, "a", &header["a"]).unwrap();
        let b = entry(&bytes, data_start, "b", &header["b"]).unwrap();
        let c = entry(&bytes, data_start, "c", &header["c"]).unwrap();
        assert_eq!(header["b"]["data_offsets"], serde_json::json!([12, 20]));
        assert_eq!(decode_f32(a.raw), vec![1.0, 2.0, 3.0]);
        assert_eq!((b.dtype, b.shape.as_slice()), ("F64", &[1, 1][..]));
        assert_eq!(decode_f64(b.raw), vec![-0.5]);
        assert_eq!(c.dtype, "I32");
        assert_eq!(c.raw, &[7, 0, 0, 0, 9, 0, 0, 0]);
    }

    #[test]
    fn empty_writer_is_a_valid_file() {
        let bytes = StWriter::new().to_bytes().unwrap();
        let (header, data_start) = parse_header(&bytes).unwrap();
        assert!(header.is_empty());
        assert_eq!(data_start, bytes.len());
        assert_eq!(data_start, 16);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut w = StWriter::new();
        w.add_f64("x", &[1.0], &[1]);
        w.add_f64("x", &[2.0], &[1]);
        assert!(w.to_bytes().is_err());
    }
}
