//! The NMF-basis galaxy SED model.
//!
//! A [`Model`] ties together the basis store, the SFH engine, the cosmology
//! and one [`SpectrumEvaluator`]. It is built once (see [`ModelBuilder`]
//! and [`Model::from_config`]) and then evaluated any number of times;
//! evaluation never mutates the model.

use log::{debug, info};
use ndarray::{Array1, ArrayView2};

use crate::assembler::{SedAssembler, SedOptions, SedOutput};
use crate::basis::BasisStore;
use crate::config::ModelConfig;
use crate::cosmology::{CosmologyAdapter, FlatLambdaCdm};
use crate::data_store::DataStore;
use crate::emulator::PcaEmulator;
use crate::error::{ModelError, ModelResult};
use crate::evaluator::{EvaluatorKind, RestFrameSpectrum, SpectrumEvaluator, SurrogateEvaluator};
use crate::params::{ParameterSchema, Theta, TimeReference};
use crate::sfh::{
    LookbackBinning, MetallicityBounds, MetallicityHistory, SfhEngine, StarFormationHistory,
};
use crate::ssp::{ReferenceEvaluator, SspEngine, SspError, UnavailableEngine};

/// SFH components the NMF model is implemented for
pub const N_SFH_COMPONENTS: usize = 4;

/// ZH components the NMF model is implemented for
pub const N_ZH_COMPONENTS: usize = 2;

/// Step-by-step construction of a [`Model`].
pub struct ModelBuilder<E> {
    basis: BasisStore,
    burst: bool,
    binning: LookbackBinning,
    bounds: MetallicityBounds,
    cosmology: Option<CosmologyAdapter>,
    preference: EvaluatorKind,
    engine: Result<E, SspError>,
    surrogate: Option<SurrogateEvaluator>,
}

impl ModelBuilder<UnavailableEngine> {
    /// Start from a loaded basis with no SSP engine attached.
    pub fn new(basis: BasisStore) -> Self {
        Self {
            basis,
            burst: true,
            binning: LookbackBinning::default(),
            bounds: MetallicityBounds::default(),
            cosmology: None,
            preference: EvaluatorKind::Reference,
            engine: Err(SspError::Initialization("no SSP engine linked".into())),
            surrogate: None,
        }
    }
}

impl<E: SspEngine> ModelBuilder<E> {
    /// Attach an SSP engine, or the error its initialization produced.
    pub fn engine<F: SspEngine>(self, engine: Result<F, SspError>) -> ModelBuilder<F> {
        ModelBuilder {
            basis: self.basis,
            burst: self.burst,
            binning: self.binning,
            bounds: self.bounds,
            cosmology: self.cosmology,
            preference: self.preference,
            engine,
            surrogate: self.surrogate,
        }
    }

    pub fn burst(mut self, burst: bool) -> Self {
        self.burst = burst;
        self
    }

    pub fn binning(mut self, binning: LookbackBinning) -> Self {
        self.binning = binning;
        self
    }

    pub fn metallicity_bounds(mut self, bounds: MetallicityBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn cosmology(mut self, cosmology: CosmologyAdapter) -> Self {
        self.cosmology = Some(cosmology);
        self
    }

    pub fn evaluator(mut self, preference: EvaluatorKind) -> Self {
        self.preference = preference;
        self
    }

    pub fn surrogate(mut self, surrogate: SurrogateEvaluator) -> Self {
        self.surrogate = Some(surrogate);
        self
    }

    /// # Errors
    /// [`ModelError::Configuration`] for a basis other than 4 SFH + 2 ZH
    /// components, or a burst schema on a surrogate without a burst
    /// emulator; [`ModelError::EngineUnavailable`] when no evaluation path
    /// remains.
    pub fn build(self) -> ModelResult<Model<E>> {
        let (n_sfh, n_zh) = (self.basis.n_sfh(), self.basis.n_zh());
        if n_sfh != N_SFH_COMPONENTS || n_zh != N_ZH_COMPONENTS {
            return Err(ModelError::configuration(format!(
                "the NMF model is implemented for {N_SFH_COMPONENTS} SFH and {N_ZH_COMPONENTS} ZH components, basis has {n_sfh} and {n_zh}"
            )));
        }

        let cosmology = match self.cosmology {
            Some(c) => c,
            None => CosmologyAdapter::new(FlatLambdaCdm::planck13())?,
        };
        let evaluator = SpectrumEvaluator::select(self.preference, self.engine, self.surrogate)?;
        if let SpectrumEvaluator::Surrogate(s) = &evaluator {
            if self.burst && !s.has_burst() {
                return Err(ModelError::configuration(
                    "burst parameters enabled but no burst emulator is loaded",
                ));
            }
        }

        let schema = ParameterSchema::new(self.burst);
        info!(
            "NMF model ({:?} evaluation) with parameters: {}",
            evaluator.kind(),
            schema.names().join(", ")
        );

        Ok(Model {
            schema,
            sfh: SfhEngine::new(self.basis, self.binning, self.bounds),
            cosmology,
            evaluator,
        })
    }
}

/// Galaxy SED forward model.
#[derive(Debug)]
pub struct Model<E = UnavailableEngine> {
    schema: ParameterSchema,
    sfh: SfhEngine,
    cosmology: CosmologyAdapter,
    evaluator: SpectrumEvaluator<E>,
}

impl<E: SspEngine> Model<E> {
    /// Build a model from a configuration file's contents.
    ///
    /// Basis tables and emulator manifests are looked up in the data
    /// directory (see [`DataStore`]).
    pub fn from_config(config: &ModelConfig, engine: Result<E, SspError>) -> ModelResult<Self> {
        let family = config.family()?;
        let store = DataStore::resolve(config.data_dir.as_deref())?;
        let basis = store.load_basis(family, config.interpolation)?;

        let surrogate = match &config.emulator {
            None => None,
            Some(emu) => {
                let continuous = PcaEmulator::from_manifest(&store.emulator_path(&emu.continuous))?;
                let burst = match &emu.burst {
                    Some(path) => Some(PcaEmulator::from_manifest(&store.emulator_path(path))?),
                    None => None,
                };
                Some(SurrogateEvaluator::new(continuous, burst)?)
            }
        };

        let mut builder = ModelBuilder::new(basis)
            .engine(engine)
            .burst(config.burst)
            .binning(config.binning)
            .metallicity_bounds(config.metallicity_bounds)
            .cosmology(CosmologyAdapter::new(config.cosmology)?)
            .evaluator(config.evaluator);
        if let Some(s) = surrogate {
            builder = builder.surrogate(s);
        }
        builder.build()
    }

    pub fn schema(&self) -> ParameterSchema {
        self.schema
    }

    pub fn parameter_names(&self) -> &'static [&'static str] {
        self.schema.names()
    }

    pub fn evaluator_kind(&self) -> EvaluatorKind {
        self.evaluator.kind()
    }

    pub fn cosmology(&self) -> &CosmologyAdapter {
        &self.cosmology
    }

    pub fn sfh_engine(&self) -> &SfhEngine {
        &self.sfh
    }

    /// The reference evaluator.
    ///
    /// # Errors
    /// [`ModelError::EngineUnavailable`] if the model runs on the surrogate.
    pub fn reference_evaluator(&self) -> ModelResult<&ReferenceEvaluator<E>> {
        match &self.evaluator {
            SpectrumEvaluator::Reference(r) => Ok(r),
            SpectrumEvaluator::Surrogate(_) => Err(ModelError::EngineUnavailable(
                "model was built without a working SSP engine".into(),
            )),
        }
    }

    /// Galaxy age in Gyr at the given epoch.
    pub fn tage(&self, time: TimeReference) -> ModelResult<f64> {
        match time {
            TimeReference::Redshift(z) if z.is_finite() && z >= 0.0 => Ok(self.cosmology.age(z)),
            TimeReference::Redshift(z) => Err(ModelError::precondition(format!(
                "redshift must be finite and non-negative (got {z})"
            ))),
            TimeReference::Age(t) => Ok(t),
        }
    }

    fn parse(&self, row: &[f64]) -> ModelResult<Theta> {
        self.schema.parse(row)
    }

    fn rows(&self, theta: ArrayView2<f64>) -> ModelResult<Vec<Theta>> {
        theta
            .rows()
            .into_iter()
            .map(|row| self.parse(&row.to_vec()))
            .collect()
    }

    /// Observed-frame spectra of `theta.nrows()` galaxies at `redshift`.
    ///
    /// # Errors
    /// [`ModelError::PreconditionViolation`] if `theta` and `redshift`
    /// disagree on the number of samples or `theta` does not match the
    /// parameter schema.
    pub fn sed(
        &self,
        theta: ArrayView2<f64>,
        redshift: &[f64],
        options: &SedOptions<'_>,
    ) -> ModelResult<SedOutput> {
        if theta.nrows() != redshift.len() {
            return Err(ModelError::precondition(format!(
                "theta has {} rows but {} redshifts were given",
                theta.nrows(),
                redshift.len()
            )));
        }
        let thetas = self.rows(theta)?;
        let assembler = SedAssembler::new(&self.cosmology);
        let n = thetas.len();

        let results = thetas
            .iter()
            .zip(redshift)
            .enumerate()
            .map(|(i, (theta, &zred))| {
                let tage = self.tage(TimeReference::Redshift(zred))?;
                debug!("sed sample {i}: z = {zred:.4}, tage = {tage:.4} Gyr");
                let rest = self.evaluator.luminosity(&self.sfh, &self.cosmology, theta, tage)?;
                assembler.assemble(rest, zred, options.vdisp_for(i, n)?, options)
            })
            .collect::<ModelResult<Vec<_>>>()?;

        Ok(SedOutput::from_results(results))
    }

    /// Rest-frame luminosity (L_sun/Å) of one parameter row at age `tage`.
    pub fn rest_frame_luminosity(&self, theta: &[f64], tage: f64) -> ModelResult<RestFrameSpectrum> {
        let theta = self.parse(theta)?;
        self.evaluator.luminosity(&self.sfh, &self.cosmology, &theta, tage)
    }

    /// Star formation history (Msun/Gyr per lookback-time bin).
    pub fn sfh(&self, theta: &[f64], time: TimeReference) -> ModelResult<StarFormationHistory> {
        let tage = self.tage(time)?;
        self.sfh.history(&self.parse(theta)?, tage)
    }

    /// Metallicity history on the same bins as [`Self::sfh`].
    pub fn zh(&self, theta: &[f64], time: TimeReference) -> ModelResult<MetallicityHistory> {
        let tage = self.tage(time)?;
        self.sfh.metallicity_history(&self.parse(theta)?, tage)
    }

    /// Mass-weighted metallicity.
    pub fn z_mw(&self, theta: &[f64], time: TimeReference) -> ModelResult<f64> {
        let tage = self.tage(time)?;
        self.sfh.mass_weighted_metallicity(&self.parse(theta)?, tage)
    }

    /// Stellar mass formed in the most recent `dt` Gyr.
    pub fn mass_formed_within(
        &self,
        theta: &[f64],
        dt: f64,
        time: TimeReference,
    ) -> ModelResult<f64> {
        let tage = self.tage(time)?;
        self.sfh.mass_formed_within(&self.parse(theta)?, tage, dt)
    }

    /// Average star formation rate over the most recent `dt` Gyr (Msun/Gyr).
    pub fn average_sfr(&self, theta: &[f64], dt: f64, time: TimeReference) -> ModelResult<f64> {
        let tage = self.tage(time)?;
        self.sfh.average_sfr(&self.parse(theta)?, tage, dt)
    }

    /// Apply `f` to every row of `theta` with its epoch. `times` holds one
    /// epoch for all rows or one per row.
    fn per_row<T>(
        &self,
        theta: ArrayView2<f64>,
        times: &[TimeReference],
        f: impl Fn(&Theta, f64) -> ModelResult<T>,
    ) -> ModelResult<Vec<T>> {
        let n = theta.nrows();
        if times.len() != 1 && times.len() != n {
            return Err(ModelError::precondition(format!(
                "{} epochs given for {n} parameter rows; expected 1 or {n}",
                times.len()
            )));
        }
        self.rows(theta)?
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let time = if times.len() == 1 { times[0] } else { times[i] };
                f(t, self.tage(time)?)
            })
            .collect()
    }

    pub fn sfh_batch(
        &self,
        theta: ArrayView2<f64>,
        times: &[TimeReference],
    ) -> ModelResult<Vec<StarFormationHistory>> {
        self.per_row(theta, times, |t, tage| self.sfh.history(t, tage))
    }

    pub fn zh_batch(
        &self,
        theta: ArrayView2<f64>,
        times: &[TimeReference],
    ) -> ModelResult<Vec<MetallicityHistory>> {
        self.per_row(theta, times, |t, tage| self.sfh.metallicity_history(t, tage))
    }

    pub fn z_mw_batch(
        &self,
        theta: ArrayView2<f64>,
        times: &[TimeReference],
    ) -> ModelResult<Array1<f64>> {
        self.per_row(theta, times, |t, tage| self.sfh.mass_weighted_metallicity(t, tage))
            .map(Array1::from)
    }

    pub fn average_sfr_batch(
        &self,
        theta: ArrayView2<f64>,
        dt: f64,
        times: &[TimeReference],
    ) -> ModelResult<Array1<f64>> {
        self.per_row(theta, times, |t, tage| self.sfh.average_sfr(t, tage, dt))
            .map(Array1::from)
    }
}
