//! Non-negative matrix factorization (NMF) bases for star formation and
//! metallicity histories.
//!
//! A basis family is a set of tabulated component curves over lookback
//! time. [`BasisStore`] owns the raw tables, one interpolant per
//! component, and a high-resolution tabulation of the SFH components on a
//! fixed `[0, 13.8]` Gyr grid that the binning code integrates over.
//!
//! Everything here is immutable after construction and is shared by all
//! evaluations of a model.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;
use sed_math::{linspace, CubicSpline, InterpError, LinearInterpolant};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or building a basis
#[derive(Debug, Error)]
pub enum BasisError {
    #[error("Unknown basis family '{0}' (expected tojeiro.4comp, tng.4comp or tng.6comp)")]
    UnknownFamily(String),

    #[error("Failed to read basis table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed value '{value}' in {path} line {line}")]
    Parse {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("Basis table {0} is empty or has rows of differing length")]
    Ragged(PathBuf),

    #[error("Basis component {component} has {got} samples but the time grid has {expected}")]
    LengthMismatch {
        component: usize,
        got: usize,
        expected: usize,
    },

    #[error("Basis table holds {got} components, expected {expected}")]
    ComponentCount { expected: usize, got: usize },

    #[error("Basis has no components")]
    Empty,

    #[error("Invalid basis time grid: {0}")]
    Grid(#[from] InterpError),
}

/// Known NMF basis families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasisFamily {
    #[serde(rename = "tojeiro.4comp")]
    Tojeiro4,
    #[serde(rename = "tng.4comp")]
    Tng4,
    #[serde(rename = "tng.6comp")]
    Tng6,
}

impl BasisFamily {
    pub fn name(&self) -> &'static str {
        match self {
            BasisFamily::Tojeiro4 => "tojeiro.4comp",
            BasisFamily::Tng4 => "tng.4comp",
            BasisFamily::Tng6 => "tng.6comp",
        }
    }

    /// SFH components stored in the family's tables
    pub fn n_sfh_components(&self) -> usize {
        match self {
            BasisFamily::Tojeiro4 | BasisFamily::Tng4 => 4,
            BasisFamily::Tng6 => 6,
        }
    }

    /// Table files the family is loaded from: SFH components, SFH time
    /// grid, ZH components and ZH time grid.
    pub fn files(&self) -> [String; 4] {
        match self {
            BasisFamily::Tojeiro4 => [
                SFH_TOJEIRO.to_string(),
                T_INTERNAL.to_string(),
                ZH_COMPONENTS.to_string(),
                T_INTERNAL.to_string(),
            ],
            BasisFamily::Tng4 | BasisFamily::Tng6 => {
                let n = self.n_sfh_components();
                [
                    format!("NMF_basis.sfh.tng{n}comp.txt"),
                    format!("t_sfh.tng{n}comp.txt"),
                    ZH_COMPONENTS.to_string(),
                    T_INTERNAL.to_string(),
                ]
            }
        }
    }
}

impl fmt::Display for BasisFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BasisFamily {
    type Err = BasisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tojeiro.4comp" => Ok(BasisFamily::Tojeiro4),
            "tng.4comp" => Ok(BasisFamily::Tng4),
            "tng.6comp" => Ok(BasisFamily::Tng6),
            other => Err(BasisError::UnknownFamily(other.to_string())),
        }
    }
}

const SFH_TOJEIRO: &str = "NMF_2basis_SFH_components_nowgt_lin_Nc4.txt";
const ZH_COMPONENTS: &str = "NMF_2basis_Z_components_nowgt_lin_Nc2.txt";
const T_INTERNAL: &str = "sfh_t_int.txt";

/// Component interpolation scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Linear,
    Cubic,
}

/// Tabulated components sharing one lookback time grid (Gyr, ascending).
#[derive(Debug, Clone)]
pub struct BasisSet {
    pub t_lookback: Vec<f64>,
    pub components: Vec<Vec<f64>>,
}

impl BasisSet {
    pub fn new(t_lookback: Vec<f64>, components: Vec<Vec<f64>>) -> Result<Self, BasisError> {
        if components.is_empty() {
            return Err(BasisError::Empty);
        }
        for (i, c) in components.iter().enumerate() {
            if c.len() != t_lookback.len() {
                return Err(BasisError::LengthMismatch {
                    component: i,
                    got: c.len(),
                    expected: t_lookback.len(),
                });
            }
        }
        Ok(Self {
            t_lookback,
            components,
        })
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[derive(Debug, Clone)]
enum ComponentCurve {
    Linear(LinearInterpolant),
    Cubic(CubicSpline),
}

impl ComponentCurve {
    fn build(t: &[f64], y: &[f64], interpolation: Interpolation) -> Result<Self, BasisError> {
        // validates ordering and length for both schemes
        let linear = LinearInterpolant::new(t.to_vec(), y.to_vec())?;
        Ok(match interpolation {
            Interpolation::Linear => ComponentCurve::Linear(linear),
            Interpolation::Cubic => ComponentCurve::Cubic(CubicSpline::new(t.to_vec(), y.to_vec())?),
        })
    }

    fn evaluate(&self, t: f64) -> f64 {
        match self {
            ComponentCurve::Linear(l) => l.evaluate(t),
            ComponentCurve::Cubic(c) => c.evaluate(t),
        }
    }
}

/// Loaded SFH and ZH bases plus their interpolants.
#[derive(Debug, Clone)]
pub struct BasisStore {
    family: Option<BasisFamily>,
    sfh: BasisSet,
    zh: BasisSet,
    sfh_curves: Vec<ComponentCurve>,
    zh_curves: Vec<ComponentCurve>,
    t_hr: Vec<f64>,
    sfh_hr: Vec<Vec<f64>>,
}

impl BasisStore {
    /// Samples of the high-resolution lookback time grid
    pub const HR_POINTS: usize = 50_000;

    /// Upper end of the high-resolution grid in Gyr
    pub const HR_T_MAX: f64 = 13.8;

    /// Build a store from in-memory basis sets.
    pub fn from_sets(
        sfh: BasisSet,
        zh: BasisSet,
        interpolation: Interpolation,
    ) -> Result<Self, BasisError> {
        let sfh_curves = sfh
            .components
            .iter()
            .map(|c| ComponentCurve::build(&sfh.t_lookback, c, interpolation))
            .collect::<Result<Vec<_>, _>>()?;
        let zh_curves = zh
            .components
            .iter()
            .map(|c| ComponentCurve::build(&zh.t_lookback, c, interpolation))
            .collect::<Result<Vec<_>, _>>()?;

        let t_hr = linspace(0.0, Self::HR_T_MAX, Self::HR_POINTS);
        let sfh_hr = sfh_curves
            .iter()
            .map(|curve| t_hr.iter().map(|&t| curve.evaluate(t)).collect())
            .collect();

        Ok(Self {
            family: None,
            sfh,
            zh,
            sfh_curves,
            zh_curves,
            t_hr,
            sfh_hr,
        })
    }

    /// Load a named basis family from `dir`.
    ///
    /// Tojeiro tables store one component per row, newest lookback time
    /// last, and a component order that is remapped to `[2, 0, 1, 3]`. TNG
    /// SFH tables store one component per column on an ascending grid.
    pub fn load(
        dir: &Path,
        family: BasisFamily,
        interpolation: Interpolation,
    ) -> Result<Self, BasisError> {
        let [sfh_file, t_sfh_file, zh_file, t_zh_file] = family.files();
        let zh_rows = reverse_rows(read_table(&dir.join(zh_file))?);
        let t_zh = reversed(read_vector(&dir.join(t_zh_file))?);

        let (t_sfh, sfh_components) = match family {
            BasisFamily::Tojeiro4 => {
                let rows = reverse_rows(read_table(&dir.join(sfh_file))?);
                if rows.len() != 4 {
                    return Err(BasisError::ComponentCount {
                        expected: 4,
                        got: rows.len(),
                    });
                }
                let reordered = [2, 0, 1, 3].iter().map(|&i| rows[i].clone()).collect();
                (t_zh.clone(), reordered)
            }
            BasisFamily::Tng4 | BasisFamily::Tng6 => (
                read_vector(&dir.join(t_sfh_file))?,
                transpose(read_table(&dir.join(sfh_file))?),
            ),
        };

        let mut store = Self::from_sets(
            BasisSet::new(t_sfh, sfh_components)?,
            BasisSet::new(t_zh, zh_rows)?,
            interpolation,
        )?;
        store.family = Some(family);
        debug!(
            "Loaded {} basis from {}: {} SFH and {} ZH components",
            family,
            dir.display(),
            store.n_sfh(),
            store.n_zh()
        );
        Ok(store)
    }

    pub fn family(&self) -> Option<BasisFamily> {
        self.family
    }

    /// Number of SFH components
    pub fn n_sfh(&self) -> usize {
        self.sfh.len()
    }

    /// Number of ZH components
    pub fn n_zh(&self) -> usize {
        self.zh.len()
    }

    pub fn sfh_set(&self) -> &BasisSet {
        &self.sfh
    }

    pub fn zh_set(&self) -> &BasisSet {
        &self.zh
    }

    /// SFH component `i` at lookback time `t` (Gyr)
    pub fn sfh_component(&self, i: usize, t: f64) -> f64 {
        self.sfh_curves[i].evaluate(t)
    }

    /// ZH component `i` at lookback time `t` (Gyr)
    pub fn zh_component(&self, i: usize, t: f64) -> f64 {
        self.zh_curves[i].evaluate(t)
    }

    /// Unclipped metallicity `Σ γ_i ZH_i(t)`
    pub fn metallicity(&self, gamma: &[f64], t: f64) -> f64 {
        gamma
            .iter()
            .zip(&self.zh_curves)
            .map(|(g, curve)| g * curve.evaluate(t))
            .sum()
    }

    /// High-resolution lookback time grid
    pub fn high_res_grid(&self) -> &[f64] {
        &self.t_hr
    }

    /// SFH component `i` tabulated on [`Self::high_res_grid`]
    pub fn high_res_component(&self, i: usize) -> &[f64] {
        &self.sfh_hr[i]
    }

    /// `Σ β_i SFH_i` on the high-resolution grid
    pub fn high_res_combination(&self, beta: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.t_hr.len()];
        for (b, comp) in beta.iter().zip(&self.sfh_hr) {
            for (o, c) in out.iter_mut().zip(comp) {
                *o += b * c;
            }
        }
        out
    }
}

/// Whitespace-separated numeric table, `#` comments and blank lines ignored.
fn read_table(path: &Path) -> Result<Vec<Vec<f64>>, BasisError> {
    let text = fs::read_to_string(path).map_err(|source| BasisError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut rows = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>().map_err(|_| BasisError::Parse {
                    path: path.to_path_buf(),
                    line: lineno + 1,
                    value: tok.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }

    let width = rows.first().map(Vec::len).unwrap_or(0);
    if width == 0 || rows.iter().any(|r| r.len() != width) {
        return Err(BasisError::Ragged(path.to_path_buf()));
    }
    Ok(rows)
}

/// A table holding a single row or a single column, flattened.
fn read_vector(path: &Path) -> Result<Vec<f64>, BasisError> {
    let rows = read_table(path)?;
    match (rows.len(), rows[0].len()) {
        (1, _) => Ok(rows.into_iter().flatten().collect()),
        (_, 1) => Ok(rows.into_iter().map(|r| r[0]).collect()),
        _ => Err(BasisError::Ragged(path.to_path_buf())),
    }
}

fn reversed(mut v: Vec<f64>) -> Vec<f64> {
    v.reverse();
    v
}

fn reverse_rows(rows: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
    rows.into_iter().map(reversed).collect()
}

fn transpose(rows: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
    let ncols = rows.first().map(Vec::len).unwrap_or(0);
    (0..ncols)
        .map(|j| rows.iter().map(|r| r[j]).collect())
        .collect()
}
