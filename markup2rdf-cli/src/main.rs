use std::process::ExitCode;

use clap::Parser;
use markup2rdf::{
    extract_html, Options, ProfileCache, ProfileError, ProfileLoader, ProfileResolver, Severity,
    Statements,
};

#[derive(Parser)]
#[command(version, about = "Extract RDF statements from an annotated web page")]
struct Args {
    #[arg(value_name = "URL")]
    target: url::Url,

    /// Abort on malformed statements instead of dropping them.
    #[arg(long)]
    strict: bool,

    /// Follow `profile` references over HTTP.
    #[arg(long)]
    profiles: bool,

    /// Print traversal decisions to stderr.
    #[arg(long)]
    trace: bool,
}

/// Loads a profile document by fetching it and extracting its own
/// statements with the default options.
struct HttpProfileLoader {
    client: reqwest::blocking::Client,
}

impl ProfileLoader for HttpProfileLoader {
    fn load(&self, iri: &str) -> Result<Statements, ProfileError> {
        let content = self
            .client
            .get(iri)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text)
            .map_err(|err| ProfileError::new(err.to_string()))?;

        let extraction = extract_html(&content, iri, &Options::default())
            .map_err(|err| ProfileError::new(err.to_string()))?;
        Ok(extraction.statements)
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();

    let client = reqwest::blocking::Client::new();
    let response = client.get(args.target.clone()).send()?.error_for_status()?;
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    if content_type.is_some_and(|ct| !ct.starts_with("text/html")) {
        eprintln!("Error: content type is not text/html.");
        return Ok(ExitCode::FAILURE);
    }

    let content = response.text()?;

    let cache = ProfileCache::new();
    let loader = HttpProfileLoader {
        client: client.clone(),
    };
    let trace = |line: &str| eprintln!("trace: {line}");
    let options = Options {
        strict: args.strict,
        profiles: args.profiles.then_some(ProfileResolver {
            cache: &cache,
            loader: &loader,
        }),
        trace: args.trace.then_some(&trace as &dyn Fn(&str)),
    };

    let extraction = extract_html(&content, args.target.as_str(), &options)?;

    let mut failed = false;
    for report in &extraction.reports {
        eprintln!("{report}");
        failed |= report.severity == Severity::Error;
    }

    for triple in &extraction.statements {
        println!("{triple} .");
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
