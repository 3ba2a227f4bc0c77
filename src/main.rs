use std::path::PathBuf;

use bilder_jobs_core::credentials::{resolve_credentials, EnvLookup};
use bilder_jobs_core::jobs::client::{ImageJobClient, JobSpec};
use bilder_jobs_core::jobs::payload::{ImageMediaType, MaskFormat, ResourceLocator};
use bilder_jobs_core::jobs::transport::ReqwestJobTransport;
use bilder_jobs_core::jobs::JobOperation;
use bilder_jobs_core::settings::load_job_settings;
use serde_json::json;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli_args = std::env::args().skip(1).collect::<Vec<_>>();
    let Some(operation) = cli_args.first().and_then(|v| JobOperation::parse(v)) else {
        print_usage();
        if cli_args
            .first()
            .is_some_and(|arg| matches!(arg.as_str(), "-h" | "--help"))
        {
            return Ok(());
        }
        return Err(std::io::Error::other("Missing or unknown command").into());
    };
    let rest = &cli_args[1..];
    if rest.iter().any(|arg| matches!(arg.as_str(), "-h" | "--help")) {
        print_usage();
        return Ok(());
    }
    let parsed = parse_job_cli_args(operation, rest)?;
    run_job_cli(parsed)
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct JobCliArgs {
    operation: JobOperation,
    input: String,
    output: String,
    app_root: Option<PathBuf>,
    settings_path: Option<String>,
    mask_format: Option<MaskFormat>,
    output_type: Option<ImageMediaType>,
    timeout_secs: Option<u64>,
}

fn parse_job_cli_args(
    operation: JobOperation,
    args: &[String],
) -> Result<JobCliArgs, Box<dyn std::error::Error>> {
    let mut input = None::<String>;
    let mut output = None::<String>;
    let mut app_root = None::<PathBuf>;
    let mut settings_path = None::<String>;
    let mut mask_format = None::<MaskFormat>;
    let mut output_type = None::<ImageMediaType>;
    let mut timeout_secs = None::<u64>;

    let mut i = 0usize;
    while i < args.len() {
        let flag = args[i].as_str();
        let needs_value = |idx: usize| -> Result<String, Box<dyn std::error::Error>> {
            let Some(value) = args.get(idx + 1) else {
                return Err(std::io::Error::other(format!("Missing value for {flag}")).into());
            };
            Ok(value.clone())
        };

        match flag {
            "--input" => input = Some(needs_value(i)?),
            "--output" => output = Some(needs_value(i)?),
            "--app-root" => app_root = Some(PathBuf::from(needs_value(i)?)),
            "--settings" => settings_path = Some(needs_value(i)?),
            "--mask-format" if operation == JobOperation::RemoveBackground => {
                let raw = needs_value(i)?;
                mask_format = Some(MaskFormat::parse(raw.as_str()).ok_or_else(|| {
                    std::io::Error::other(format!("Invalid --mask-format: {raw}"))
                })?);
            }
            "--output-type" if operation == JobOperation::AutoTone => {
                let raw = needs_value(i)?;
                output_type = Some(ImageMediaType::parse(raw.as_str()).ok_or_else(|| {
                    std::io::Error::other(format!("Invalid --output-type: {raw}"))
                })?);
            }
            "--timeout-secs" => {
                let raw = needs_value(i)?;
                timeout_secs = Some(
                    raw.parse::<u64>()
                        .ok()
                        .filter(|v| *v > 0)
                        .ok_or_else(|| {
                            std::io::Error::other(format!("Invalid --timeout-secs: {raw}"))
                        })?,
                );
            }
            unknown => {
                return Err(std::io::Error::other(format!(
                    "Unknown argument: {unknown}\n\nUse --help for usage."
                ))
                .into());
            }
        }
        i += 2;
    }

    let input = input
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| std::io::Error::other("Missing required --input"))?;
    let output = output
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| std::io::Error::other("Missing required --output"))?;
    Ok(JobCliArgs {
        operation,
        input,
        output,
        app_root,
        settings_path,
        mask_format,
        output_type,
        timeout_secs,
    })
}

fn run_job_cli(args: JobCliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let app_root = match args.app_root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let mut settings = load_job_settings(app_root.as_path(), args.settings_path.as_deref())?;
    if let Some(v) = args.mask_format {
        settings.options.mask_format = v;
    }
    if let Some(v) = args.output_type {
        settings.options.output_type = v;
    }
    if let Some(v) = args.timeout_secs {
        settings.polling.timeout_secs = v;
    }

    let spec = JobSpec {
        operation: args.operation,
        input: ResourceLocator::external(args.input.as_str(), "input")?,
        output: ResourceLocator::external(args.output.as_str(), "output")?,
        options: settings.options,
    };

    let transport = ReqwestJobTransport::new(settings.polling.request_timeout())?;
    let env = EnvLookup::load(app_root.as_path())?;
    let credentials = resolve_credentials(&transport, &settings.adobe, &env)?;

    let client = ImageJobClient::new(transport, settings.adobe.api_base_url.clone())
        .with_limits(settings.polling.limits());
    let report = client.run_job(&spec, &credentials, None)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "ok": report.succeeded(),
            "report": report
        }))?
    );
    Ok(())
}

fn print_usage() {
    eprintln!(
        concat!(
            "Usage:\n",
            "  bilder-jobs remove-background --input URL --output URL [--mask-format soft|binary] [OPTIONS]\n",
            "  bilder-jobs auto-tone --input URL --output URL [--output-type image/jpeg|image/png|image/tiff] [OPTIONS]\n\n",
            "Options:\n",
            "  --app-root PATH      directory holding .env and config/ (default: current dir)\n",
            "  --settings PATH      settings file, .toml or .json (default: config/bilder.settings.toml)\n",
            "  --timeout-secs N     give up polling after N seconds\n\n",
            "Credentials:\n",
            "  ADOBE_CLIENT_ID plus ADOBE_ACCESS_TOKEN, or ADOBE_CLIENT_SECRET to request a token\n"
        )
    );
}
