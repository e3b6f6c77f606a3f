use argh::FromArgs;
use std::{
    error::Error,
    path::{Path, PathBuf},
    process::ExitCode,
};

use stencil::{
    dist::{run_backend, Backend, DistError, ParallelConfig},
    imgproc::stencil::{StencilSpec, DEFAULT_SIGMA},
    io::functional as F,
};

#[derive(FromArgs)]
/// Apply a convolution stencil to an image with row-partitioned workers
struct Args {
    /// input image file name, relative to the input directory
    #[argh(positional)]
    input: String,

    /// output image file name, relative to the output directory
    #[argh(positional)]
    output: String,

    /// directory holding the input images
    #[argh(option, default = "PathBuf::from(\"inputImages\")")]
    input_dir: PathBuf,

    /// directory receiving the output images
    #[argh(option, default = "PathBuf::from(\"outputImages\")")]
    output_dir: PathBuf,

    /// the stencil to apply: gaussian, mean, sharpen, laplacian, sobel or emboss
    #[argh(option, short = 'f')]
    filter: Option<String>,

    /// the sigma for the gaussian stencil
    #[argh(option)]
    sigma: Option<f32>,

    /// the number of workers
    #[argh(option, short = 'w')]
    workers: Option<usize>,

    /// the number of threads per worker
    #[argh(option, short = 't')]
    threads: Option<usize>,

    /// where to run: serial, threaded or distributed
    #[argh(option)]
    backend: Option<Backend>,

    /// a json run file; flags given on the command line take precedence
    #[argh(option)]
    config: Option<PathBuf>,
}

/// Run settings read from a json file.
#[derive(Debug, Default, serde::Deserialize)]
struct RunFile {
    stencil: Option<StencilSpec>,
    backend: Option<Backend>,
    parallel: Option<ParallelConfig>,
}

impl RunFile {
    fn from_path(path: &Path) -> Result<Self, Box<dyn Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read run file {}: {e}", path.display()))?;
        let run_file = serde_json::from_str(&contents)
            .map_err(|e| format!("invalid run file {}: {e}", path.display()))?;
        Ok(run_file)
    }
}

#[derive(Debug, PartialEq)]
struct Settings {
    spec: StencilSpec,
    backend: Backend,
    config: ParallelConfig,
}

fn resolve_settings(args: &Args, run_file: RunFile) -> Result<Settings, Box<dyn Error>> {
    let spec = match (&args.filter, run_file.stencil) {
        (Some(family), _) => StencilSpec::from_family(family, args.sigma)?,
        (None, Some(StencilSpec::Gaussian { sigma })) => StencilSpec::Gaussian {
            sigma: args.sigma.unwrap_or(sigma),
        },
        (None, Some(spec)) => spec,
        (None, None) => StencilSpec::Gaussian {
            sigma: args.sigma.unwrap_or(DEFAULT_SIGMA),
        },
    };

    let mut config = run_file.parallel.unwrap_or_default();
    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }
    if let Some(threads) = args.threads {
        config.threads_per_worker = threads;
    }

    let backend = args.backend.or(run_file.backend).unwrap_or_default();

    Ok(Settings {
        spec,
        backend,
        config,
    })
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let run_file = match &args.config {
        Some(path) => RunFile::from_path(path)?,
        None => RunFile::default(),
    };
    let settings = resolve_settings(args, run_file)?;

    let input_path = args.input_dir.join(&args.input);
    let output_path = args.output_dir.join(&args.output);
    log::debug!(
        "applying {} to {} with the {} backend",
        settings.spec,
        input_path.display(),
        settings.backend
    );

    let (image, report) = run_backend(
        settings.backend,
        || F::read_image_any_rgb8(&input_path).map_err(DistError::image_source),
        &settings.spec,
        &settings.config,
    )?;

    F::write_image_png_rgb8(&output_path, &image)
        .map_err(|e| format!("failed to write {}: {e}", output_path.display()))?;

    println!("Time taken: {:.6} seconds", report.elapsed.as_secs_f64());
    log::info!("wrote {}", output_path.display());

    Ok(())
}

fn describe(err: &dyn Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(&format!(": {cause}"));
        source = cause.source();
    }
    msg
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Args = argh::from_env();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", describe(err.as_ref()));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil::image::Image;

    fn args(input_dir: &Path, output_dir: &Path) -> Args {
        Args {
            input: "in.png".to_string(),
            output: "out.png".to_string(),
            input_dir: input_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            filter: None,
            sigma: None,
            workers: None,
            threads: None,
            backend: None,
            config: None,
        }
    }

    #[test]
    fn settings_defaults() -> Result<(), Box<dyn Error>> {
        let args = args(Path::new("a"), Path::new("b"));
        let settings = resolve_settings(&args, RunFile::default())?;
        assert_eq!(
            settings.spec,
            StencilSpec::Gaussian {
                sigma: DEFAULT_SIGMA
            }
        );
        assert_eq!(settings.backend, Backend::Distributed);
        assert_eq!(settings.config.worker_count, 1);
        Ok(())
    }

    #[test]
    fn settings_flags_override_file() -> Result<(), Box<dyn Error>> {
        let run_file: RunFile = serde_json::from_str(
            r#"{
                "stencil": {"family": "gaussian", "sigma": 2.0},
                "backend": "threaded",
                "parallel": {"worker_count": 3, "threads_per_worker": 2}
            }"#,
        )?;

        let mut args = args(Path::new("a"), Path::new("b"));
        args.sigma = Some(1.5);
        args.workers = Some(5);
        args.backend = Some(Backend::Serial);

        let settings = resolve_settings(&args, run_file)?;
        assert_eq!(settings.spec, StencilSpec::Gaussian { sigma: 1.5 });
        assert_eq!(settings.backend, Backend::Serial);
        assert_eq!(settings.config, ParallelConfig::new(5, 2));
        Ok(())
    }

    #[test]
    fn settings_unknown_filter() {
        let mut args = args(Path::new("a"), Path::new("b"));
        args.filter = Some("median".to_string());
        assert!(resolve_settings(&args, RunFile::default()).is_err());
    }

    #[test]
    fn run_writes_output() -> Result<(), Box<dyn Error>> {
        let input_dir = tempfile::tempdir()?;
        let output_dir = tempfile::tempdir()?;

        let image = Image::<u8, 3>::from_size_val([5, 4].into(), 128)?;
        F::write_image_png_rgb8(input_dir.path().join("in.png"), &image)?;

        let mut args = args(input_dir.path(), output_dir.path());
        args.workers = Some(2);
        args.threads = Some(1);
        run(&args)?;

        let output = F::read_image_any_rgb8(output_dir.path().join("out.png"))?;
        assert_eq!(output, image);
        Ok(())
    }

    #[test]
    fn run_failure_writes_nothing() -> Result<(), Box<dyn Error>> {
        let input_dir = tempfile::tempdir()?;
        let output_dir = tempfile::tempdir()?;

        let args = args(input_dir.path(), output_dir.path());
        assert!(run(&args).is_err());
        assert!(!output_dir.path().join("out.png").exists());
        Ok(())
    }
}
