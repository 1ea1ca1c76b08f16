use std::{
    error::Error as StdError,
    fs::File,
    io::{self, Write},
    process,
};

use clap::Parser;
use fontprep::{Config, Error, FontStore};
use log::error;
use serde_json::json;

mod args;

use args::{font_id, process_request, Args, Command};

fn run(args: Args) -> Result<serde_json::Value, Error> {
    let config = Config::load(args.config.as_deref())?;
    let store = FontStore::new(&config)?;
    let result = match args.command {
        Command::Create { file } => {
            let upload = File::open(&file).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::MissingInput("file"),
                _ => Error::FileIo { path: file, source: e },
            })?;
            json!(fontprep::create(&store, upload)?)
        }
        Command::Process {
            id,
            fixes,
            hinting,
            ranges,
            outputs,
            out_dir,
        } => {
            let id = font_id(&id)?;
            let request =
                process_request(&fixes, hinting.as_deref(), &ranges, &outputs, out_dir)?;
            json!(fontprep::process(&store, &id, &request)?)
        }
        Command::Delete { id } => json!(fontprep::delete(&store, &font_id(&id)?)?),
    };
    Ok(result)
}

fn main() {
    env_logger::builder()
        .format(|buf, record| {
            let ts = buf.timestamp_micros();
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{}: {:?}: {style}{}{style:#}: {}",
                ts,
                std::thread::current().id(),
                record.level(),
                record.args()
            )
        })
        .init();

    match run(Args::parse()) {
        Ok(result) => println!("{result}"),
        Err(e) => {
            error!("{e}");
            let mut source = e.source();
            while let Some(cause) = source {
                error!("Caused by: {cause}");
                source = cause.source();
            }
            println!("{}", json!({ "message": e.to_string(), "code": e.code() }));
            process::exit(1);
        }
    }
}
