use serde_json::{json, Map, Value};
use tracing::{error, info, span, Level};
use tracing_subscriber::EnvFilter;

use blobact::{BlobActivity, UploadInput};

fn settings_from_args(matches: &clap::ArgMatches) -> Map<String, Value> {
    let mut settings = Map::new();

    for (arg, key) in [
        ("account", "azure_storage_account"),
        ("access-key", "azure_storage_access_key"),
        ("container", "container_name"),
        ("METHOD", "method"),
        ("endpoint", "endpoint"),
    ] {
        if let Some(value) = matches.get_one::<String>(arg) {
            settings.insert(key.to_string(), json!(value));
        }
    }

    for (arg, key) in [
        ("block-size", "block_size"),
        ("parallelism", "parallelism"),
        ("max-results", "max_results"),
        ("timeout-secs", "timeout_secs"),
    ] {
        if let Some(value) = matches.get_one::<u64>(arg) {
            settings.insert(key.to_string(), json!(value));
        }
    }

    settings
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let span = span!(Level::INFO, "main", context = "main");
    let _e = span.enter();
    info!("called");

    let matches = clap::Command::new("blobact")
        .version(clap::crate_version!())
        .about("Upload a file to, or list, an Azure blob container")
        .arg(
            clap::Arg::new("METHOD")
                .required(true)
                .index(1)
                .help("`upload` or `list`"),
        )
        .arg(
            clap::Arg::new("account")
                .long("account")
                .env("AZURE_STORAGE_ACCOUNT")
                .required(true),
        )
        .arg(
            clap::Arg::new("access-key")
                .long("access-key")
                .env("AZURE_STORAGE_ACCESS_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(clap::Arg::new("container").long("container").required(true))
        .arg(clap::Arg::new("endpoint").long("endpoint"))
        .arg(clap::Arg::new("file").long("file").default_value(""))
        .arg(clap::Arg::new("data").long("data").default_value(""))
        .arg(
            clap::Arg::new("block-size")
                .long("block-size")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            clap::Arg::new("parallelism")
                .long("parallelism")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            clap::Arg::new("max-results")
                .long("max-results")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            clap::Arg::new("timeout-secs")
                .long("timeout-secs")
                .value_parser(clap::value_parser!(u64)),
        )
        .get_matches();

    let activity = match BlobActivity::from_map(&settings_from_args(&matches)) {
        Err(err) => {
            error!(error_message=%err, error_group="configure");
            eprintln!("error: {}", err);
            std::process::exit(2);
        }
        Ok(activity) => activity,
    };

    let input = UploadInput::new(
        matches.get_one::<String>("file").map(String::as_str).unwrap_or(""),
        matches.get_one::<String>("data").map(String::as_str).unwrap_or(""),
    );

    let output = match activity.eval_async(&input).await {
        Err(err) => {
            error!(error_message=%err, error_group="eval");
            eprintln!("error: {}", err);
            std::process::exit(1);
        }
        Ok(output) => output,
    };

    match serde_json::to_string_pretty(&Value::Object(output.to_map())) {
        Err(err) => {
            error!(error_message=%err, error_group="serialize");
            std::process::exit(1);
        }
        Ok(rendered) => println!("{}", rendered),
    }
}
