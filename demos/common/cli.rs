use std::path::PathBuf;

/// The sample photo classified when no other image is given.
pub const DEFAULT_IMAGE_URL: &str = "https://s.hdnux.com/photos/75/50/00/16154647/5/920x920.jpg";

pub const HELP: &str = "\
Burn CIFAR-10 Example

Trains a small convolutional network on CIFAR-10 and/or runs inference with it.
Models, optimizers, configurations, training history and image grids are persisted
in an artifacts directory.

USAGE:
    cifar10 [OPTIONS]

When no --training or --inference flag is provided, the program exits after handling configuration logic.

BEHAVIOR OVERVIEW
- If --training-config is given, the config is loaded from that file and saved to the artifacts directory.
- Otherwise the config is loaded from the artifacts directory; if absent, a default one is created and saved.
- The dataset is downloaded into the data path on first use.
- During training, the model and optimizer are saved after every epoch, and the per-epoch history
  is written to history.csv and plotted on the terminal at the end.
- Inference classifies the first validation batch (saved as a framed image grid) and then the image
  at --url, or the local --image if given.
- If both --training and --inference are specified, training executes first.

FLAGS:
    -h, --help                  Show this help message and exit

OPTIONS:
    -t, --training              Run training (creates or updates model / optimizer)
    -i, --inference             Run inference after training (if both flags are used) or immediately
    -r, --remove-artifacts      Delete existing model and optimizer files from the artifacts directory before training
                                (has no effect if --training is not used)
    -c, --training-config <PATH>
                                Load training configuration from this file (overrides any config in artifacts directory)
    -a, --artifacts-path <PATH>
                                Directory where configurations, weights, optimizer state and outputs are saved.
                                Defaults to a newly created temporary directory (path will be printed).
    -d, --data-path <PATH>      Dataset directory. Defaults to ~/.cache/burn-dataset/cifar10
    -u, --url <URL>             Image to classify after the validation batch. Defaults to a sample photo
    -f, --image <PATH>          Local image to classify instead of the url one
";

#[derive(Debug)]
pub struct AppArgs {
    pub training: bool,
    pub inference: bool,
    pub remove_artifacts: bool,
    pub training_config: Option<PathBuf>,
    pub artifacts_path: PathBuf,
    pub data_path: Option<PathBuf>,
    pub url: String,
    pub image: Option<PathBuf>,
}

impl AppArgs {
    pub fn parse() -> Result<Self, pico_args::Error> {
        let mut pargs = pico_args::Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            println!("{}", HELP);
            std::process::exit(0);
        }

        let args = AppArgs {
            training_config: pargs
                .opt_value_from_os_str(["-c", "--training-config"], parse_path)?,
            artifacts_path: match pargs
                .opt_value_from_os_str(["-a", "--artifacts-path"], parse_path)?
            {
                Some(path) => path,
                None => new_artifacts_dir()?,
            },
            data_path: pargs.opt_value_from_os_str(["-d", "--data-path"], parse_path)?,
            url: pargs
                .opt_value_from_str(["-u", "--url"])?
                .unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
            image: pargs.opt_value_from_os_str(["-f", "--image"], parse_path)?,
            // must parse flags after values
            training: pargs.contains(["-t", "--training"]),
            inference: pargs.contains(["-i", "--inference"]),
            remove_artifacts: pargs.contains(["-r", "--remove-artifacts"]),
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            return Err(pico_args::Error::ArgumentParsingFailed {
                cause: format!("unused arguments: {remaining:?}"),
            });
        }

        Ok(args)
    }
}

fn parse_path(s: &std::ffi::OsStr) -> Result<PathBuf, &'static str> {
    Ok(s.into())
}

/// e.g. /tmp/burn-cifar-cifar10-abcd-0
fn new_artifacts_dir() -> Result<PathBuf, pico_args::Error> {
    let name = format!(
        "{}-{}-",
        std::env!("CARGO_PKG_NAME"), // burn-cifar
        std::env!("CARGO_BIN_NAME")  // cifar10
    );
    let tmp = temp_dir::TempDir::with_prefix(name)
        .map_err(|err| pico_args::Error::ArgumentParsingFailed {
            cause: format!("failed to create the temporary directory: {err}"),
        })?
        .dont_delete_on_drop();
    let path = tmp.path().to_path_buf();
    println!("new artifacts directory: {path:?}");
    Ok(path)
}
