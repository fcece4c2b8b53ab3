//! End-to-end properties of the NMF model on synthetic fixtures
//!
//! Every model here runs on the analytic basis from `galsed::test_util`;
//! the reference path uses the toy SSP engine and the surrogate path uses
//! constant emulator bundles.

use approx::assert_relative_eq;
use galsed::assembler::SedOptions;
use galsed::sfh::LookbackBinning;
use galsed::test_util::{
    constant_emulator, synthetic_basis, synthetic_sfh_engine, toy_model, ToySspEngine,
};
use galsed::{
    DomainWarning, EvaluatorKind, Model, ModelBuilder, ModelError, ParameterSchema,
    SurrogateEvaluator, TimeReference,
};
use ndarray::{array, Array1, Array2};
use sed_math::{interp, trapezoid};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const THETA: [f64; 10] = [10.0, 0.25, 0.25, 0.25, 0.25, 0.5, 0.5, 0.0, 0.0, 0.0];

fn burst_row(fburst: f64, tburst: f64) -> [f64; 12] {
    [10.0, 0.25, 0.25, 0.25, 0.25, fburst, tburst, 0.5, 0.5, 0.0, 0.0, 0.0]
}

fn row(values: &[f64]) -> Array2<f64> {
    Array2::from_shape_vec((1, values.len()), values.to_vec()).unwrap()
}

fn template_wave() -> Array1<f64> {
    Array1::linspace(1000.0, 10000.0, 901)
}

fn reference_template_model(burst: bool) -> Model<ToySspEngine> {
    ModelBuilder::new(synthetic_basis())
        .engine(Ok(ToySspEngine::template(template_wave())))
        .burst(burst)
        .build()
        .unwrap()
}

fn surrogate_template_model(burst: bool) -> Model {
    let wave = template_wave();
    let log_template = ToySspEngine::template(wave.clone())
        .template_luminosity()
        .mapv(f64::ln);
    let burst_emulator = burst.then(|| constant_emulator(&wave, &log_template, 4, 2));
    let surrogate =
        SurrogateEvaluator::new(constant_emulator(&wave, &log_template, 9, 4), burst_emulator)
            .unwrap();
    ModelBuilder::new(synthetic_basis())
        .evaluator(EvaluatorKind::Surrogate)
        .surrogate(surrogate)
        .burst(burst)
        .build()
        .unwrap()
}

#[test]
fn test_sfh_conserves_mass_for_any_simplex_point() {
    init_logging();
    let model = toy_model(false);
    let betas = [
        [0.25, 0.25, 0.25, 0.25],
        [0.7, 0.1, 0.1, 0.1],
        [0.0, 0.0, 0.0, 1.0],
        [0.05, 0.6, 0.3, 0.05],
        [1.0, 0.0, 0.0, 0.0],
    ];
    for beta in betas {
        for tage in [0.5, 3.0, 13.7] {
            let mut theta = THETA;
            theta[1..5].copy_from_slice(&beta);
            let sfh = model.sfh(&theta, TimeReference::Age(tage)).unwrap();
            assert_relative_eq!(sfh.total_mass(), 1e10, max_relative = 1e-9);
        }
    }
}

#[test]
fn test_metallicity_history_stays_in_bounds() {
    init_logging();
    let model = toy_model(false);
    let bounds = *model.sfh_engine().bounds();
    for gamma in [[0.0, 0.0], [0.5, 0.5], [3.0, 0.1], [100.0, 100.0], [1e-4, 1e-4]] {
        let mut theta = THETA;
        theta[5..7].copy_from_slice(&gamma);
        let zh = model.zh(&theta, TimeReference::Redshift(0.1)).unwrap();
        assert!(
            zh.metallicity.iter().all(|&z| bounds.contains(z)),
            "gamma {gamma:?} left the isochrone range"
        );
    }
}

#[test]
fn test_clipping_is_reported_with_the_spectrum() {
    init_logging();
    let model = toy_model(false);
    let mut theta = THETA;
    theta[5..7].copy_from_slice(&[100.0, 100.0]);
    let out = model
        .sed(row(&theta).view(), &[0.1], &SedOptions::default())
        .unwrap();
    let result = &out.results()[0];
    assert!(matches!(
        result.warnings.as_slice(),
        [DomainWarning::MetallicityClipped { .. }]
    ));
}

#[test]
fn test_disabled_burst_matches_no_burst_model() {
    init_logging();
    let plain = toy_model(false);
    let bursty = toy_model(true);
    let opts = SedOptions::default();

    let expected = plain.sed(row(&THETA).view(), &[0.1], &opts).unwrap();
    let expected = &expected.results()[0];

    // zero burst fraction, and a burst after the observation
    for burst in [burst_row(0.0, 2.0), burst_row(0.5, 13.5)] {
        let got = bursty.sed(row(&burst).view(), &[0.1], &opts).unwrap();
        let got = &got.results()[0];
        assert_eq!(got.wavelength, expected.wavelength);
        for (a, b) in got.flux.iter().zip(expected.flux.iter()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }

        let sfh = bursty.sfh(&burst, TimeReference::Redshift(0.1)).unwrap();
        let sfh_plain = plain.sfh(&THETA, TimeReference::Redshift(0.1)).unwrap();
        for (a, b) in sfh.sfr.iter().zip(&sfh_plain.sfr) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
    }
}

#[test]
fn test_massless_young_burst_matches_plain_on_both_paths() {
    init_logging();
    // tburst below the SSP floor is harmless when the burst has no mass
    let massless = burst_row(0.0, 0.005);

    let reference = reference_template_model(true)
        .rest_frame_luminosity(&massless, 10.0)
        .unwrap();
    let reference_plain = reference_template_model(false)
        .rest_frame_luminosity(&THETA, 10.0)
        .unwrap();
    assert_eq!(reference.luminosity, reference_plain.luminosity);

    let surrogate = surrogate_template_model(true)
        .rest_frame_luminosity(&massless, 10.0)
        .unwrap();
    let surrogate_plain = surrogate_template_model(false)
        .rest_frame_luminosity(&THETA, 10.0)
        .unwrap();
    assert_eq!(surrogate.luminosity, surrogate_plain.luminosity);

    let sfh = toy_model(true)
        .sfh(&massless, TimeReference::Age(10.0))
        .unwrap();
    assert_relative_eq!(sfh.total_mass(), 1e10, max_relative = 1e-9);
}

#[test]
fn test_resampling_onto_native_grid_round_trips() {
    init_logging();
    let model = toy_model(false);
    let native = model
        .sed(row(&THETA).view(), &[0.1], &SedOptions::default())
        .unwrap();
    let native = &native.results()[0];

    let grid = native.wavelength.to_vec();
    let opts = SedOptions {
        wavelength: Some(grid.as_slice()),
        ..Default::default()
    };
    let resampled = model.sed(row(&THETA).view(), &[0.1], &opts).unwrap();
    let resampled = &resampled.results()[0];

    let n = grid.len();
    for i in 0..n {
        let tol = if i == 0 || i == n - 1 { 1e-2 } else { 1e-3 };
        assert_relative_eq!(resampled.flux[i], native.flux[i], max_relative = tol);
    }
}

#[test]
fn test_velocity_dispersion() {
    init_logging();
    let model = toy_model(false);
    let plain = model
        .sed(row(&THETA).view(), &[0.1], &SedOptions::default())
        .unwrap();
    let plain = &plain.results()[0];

    let zero = [0.0];
    let unchanged = model
        .sed(
            row(&THETA).view(),
            &[0.1],
            &SedOptions {
                vdisp: &zero,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(&unchanged.results()[0], plain);

    let vdisp = [200.0];
    let smoothed = model
        .sed(
            row(&THETA).view(),
            &[0.1],
            &SedOptions {
                vdisp: &vdisp,
                ..Default::default()
            },
        )
        .unwrap();
    let smoothed = &smoothed.results()[0];
    let (lo, hi) = (smoothed.wavelength[0], smoothed.wavelength[smoothed.wavelength.len() - 1]);

    // integrate the unsmoothed spectrum over exactly the smoothed range
    let wave = plain.wavelength.as_slice().unwrap();
    let flux = plain.flux.as_slice().unwrap();
    let mut w = vec![lo];
    w.extend(wave.iter().copied().filter(|&x| x > lo && x < hi));
    w.push(hi);
    let f: Vec<f64> = w.iter().map(|&x| interp(x, wave, flux).unwrap()).collect();
    let before = trapezoid(&w, &f);
    let after = trapezoid(
        smoothed.wavelength.as_slice().unwrap(),
        smoothed.flux.as_slice().unwrap(),
    );
    assert_relative_eq!(after, before, max_relative = 2e-3);
}

#[test]
fn test_reference_and_surrogate_agree() {
    init_logging();
    let reference = reference_template_model(false);
    let surrogate = surrogate_template_model(false);
    assert_eq!(reference.evaluator_kind(), EvaluatorKind::Reference);
    assert_eq!(surrogate.evaluator_kind(), EvaluatorKind::Surrogate);

    let opts = SedOptions::default();
    let a = reference.sed(row(&THETA).view(), &[0.1], &opts).unwrap();
    let b = surrogate.sed(row(&THETA).view(), &[0.1], &opts).unwrap();
    let (a, b) = (&a.results()[0], &b.results()[0]);

    assert_eq!(a.wavelength, b.wavelength);
    let total_a = trapezoid(a.wavelength.as_slice().unwrap(), a.flux.as_slice().unwrap());
    let total_b = trapezoid(b.wavelength.as_slice().unwrap(), b.flux.as_slice().unwrap());
    assert!(total_a > 0.0);
    assert_relative_eq!(total_a, total_b, max_relative = 1e-2);
}

#[test]
fn test_old_burst_diverges_between_paths() {
    init_logging();
    let surrogate = surrogate_template_model(true);
    let reference = reference_template_model(true);
    let theta = burst_row(0.3, 14.0);

    // the burst emulator has nothing past its training range
    let evaluator = SurrogateEvaluator::new(
        constant_emulator(&template_wave(), &Array1::zeros(901), 9, 1),
        Some(constant_emulator(&template_wave(), &Array1::zeros(901), 4, 1)),
    )
    .unwrap();
    let parsed = ParameterSchema::new(true).parse(&theta).unwrap();
    let (burst_lum, warning) = evaluator
        .burst_luminosity(&synthetic_sfh_engine(), &parsed, 14.0)
        .unwrap();
    assert!(burst_lum.iter().all(|&l| l == 0.0));
    assert_eq!(
        warning,
        Some(DomainWarning::BurstBeyondEmulatorRange { tburst: 14.0 })
    );

    // within an old galaxy the surrogate drops the burst and says so
    let old = burst_row(0.3, 13.4);
    let spec = surrogate.rest_frame_luminosity(&old, 13.7).unwrap();
    assert!(spec
        .warnings
        .contains(&DomainWarning::BurstBeyondEmulatorRange { tburst: 13.4 }));
    let plain = surrogate_template_model(false)
        .rest_frame_luminosity(&THETA, 13.7)
        .unwrap();
    for (a, b) in spec.luminosity.iter().zip(plain.luminosity.iter()) {
        assert_relative_eq!(*a, 0.7 * b, max_relative = 1e-12);
    }

    // the reference path still produces a finite, non-zero spectrum
    let out = reference
        .sed(row(&theta).view(), &[0.1], &SedOptions::default())
        .unwrap();
    let flux = &out.results()[0].flux;
    assert!(flux.iter().all(|f| f.is_finite()));
    assert!(flux.iter().any(|&f| f > 0.0));
}

#[test]
fn test_average_sfr_rejects_full_window() {
    init_logging();
    let model = toy_model(false);
    let edges = LookbackBinning::default().edges(10.0).unwrap();
    let oldest = edges[edges.len() - 1];
    assert!(matches!(
        model.average_sfr(&THETA, oldest, TimeReference::Age(10.0)),
        Err(ModelError::PreconditionViolation(_))
    ));
    assert!(model
        .average_sfr(&THETA, 0.1, TimeReference::Age(10.0))
        .unwrap()
        .is_finite());
}

#[test]
fn test_batch_sed_stacks() {
    init_logging();
    let model = toy_model(false);
    let theta = array![
        [10.0, 0.25, 0.25, 0.25, 0.25, 0.5, 0.5, 0.0, 0.0, 0.0],
        [9.5, 0.1, 0.2, 0.3, 0.4, 0.5, 0.5, 0.1, 0.3, -0.2],
        [11.0, 0.4, 0.3, 0.2, 0.1, 0.5, 0.5, 0.0, 0.5, 0.0],
    ];
    let target: Vec<f64> = (0..300).map(|i| 3000.0 + 10.0 * i as f64).collect();
    let vdisp = [0.0, 100.0, 300.0];
    let opts = SedOptions {
        vdisp: &vdisp,
        wavelength: Some(target.as_slice()),
        ..Default::default()
    };
    let out = model.sed(theta.view(), &[0.05, 0.1, 0.2], &opts).unwrap();
    let stacked = out.stack().unwrap();
    assert_eq!(stacked.flux.dim(), (3, 300));
    assert!(stacked.flux.iter().all(|f| f.is_finite() && *f > 0.0));

    // the brighter, closer galaxy is brighter
    assert!(stacked.flux[[0, 150]] > stacked.flux[[1, 150]]);
}
