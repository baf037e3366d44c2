//! Parsing of the CUDA core probe's stdout.
//!
//! The probe prints a header line followed by `label:value` lines in a fixed
//! order, and fields are read by position. Any change to the order printed by
//! the probe image must be matched by a new [`ProbeSchema`] here.

use edgescout_common::types::ResourceUnit;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MULTIPROCESSORS_UNIT: &str = "multiprocessors";
pub const CUDA_CORES_UNIT: &str = "cuda-cores";

/// Version of the probe output layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeSchema {
    /// First helper image: nine or more data lines, name on the second
    V1,
    /// Ten data lines, name first
    #[default]
    V2,
}

/// Positions of the fields within the data lines (header excluded)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPositions {
    pub name: usize,
    pub multiprocessors: usize,
    pub cuda_cores: usize,
    pub memory: usize,
}

impl FieldPositions {
    /// Number of data lines needed to read every field
    pub fn required_lines(&self) -> usize {
        [self.name, self.multiprocessors, self.cuda_cores, self.memory]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }
}

impl ProbeSchema {
    pub fn positions(&self) -> FieldPositions {
        match self {
            ProbeSchema::V1 => FieldPositions {
                name: 1,
                multiprocessors: 3,
                cuda_cores: 4,
                memory: 8,
            },
            ProbeSchema::V2 => FieldPositions {
                name: 0,
                multiprocessors: 4,
                cuda_cores: 5,
                memory: 9,
            },
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProbeParseError {
    #[error("probe printed {found} data lines, schema {schema:?} needs at least {needed}")]
    TooFewLines {
        schema: ProbeSchema,
        found: usize,
        needed: usize,
    },

    #[error("probe line {line} has no ':' separator")]
    MissingSeparator { line: usize },

    #[error("probe memory field '{0}' is not a '<value> <unit>' pair")]
    InvalidMemory(String),
}

/// Device name and capability metrics reported by the probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CudaCoreInfo {
    pub name: String,
    pub resources: Vec<ResourceUnit>,
}

/// Parse probe stdout according to `schema`
///
/// The first line is a header and is discarded, as is a single trailing
/// newline. Each remaining line keeps the trimmed text after its first colon.
pub fn parse_probe_output(stdout: &str, schema: ProbeSchema) -> Result<CudaCoreInfo, ProbeParseError> {
    let body = stdout.strip_suffix('\n').unwrap_or(stdout);
    let data: Vec<&str> = body.split('\n').skip(1).collect();

    let values = data
        .iter()
        .enumerate()
        .map(|(i, line)| {
            line.split_once(':')
                .map(|(_, value)| value.trim())
                .ok_or(ProbeParseError::MissingSeparator { line: i + 1 })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let positions = schema.positions();
    let needed = positions.required_lines();
    if values.len() < needed {
        return Err(ProbeParseError::TooFewLines {
            schema,
            found: values.len(),
            needed,
        });
    }

    let memory = values[positions.memory];
    let mut memory_parts = memory.split_whitespace();
    let (Some(capacity), Some(unit)) = (memory_parts.next(), memory_parts.next_back()) else {
        return Err(ProbeParseError::InvalidMemory(memory.to_string()));
    };

    Ok(CudaCoreInfo {
        name: values[positions.name].to_string(),
        resources: vec![
            ResourceUnit::new(MULTIPROCESSORS_UNIT, values[positions.multiprocessors]),
            ResourceUnit::new(CUDA_CORES_UNIT, values[positions.cuda_cores]),
            ResourceUnit::new(unit, capacity),
        ],
    })
}
