use log::error;

use clap::Parser;
use regatta_server::config::Config;
use regatta_server::persistance;
use regatta_server::routes::routes;
use regatta_server::security::Security;
use regatta_server::service::ConfigService;
use warp::Filter;

/// Regatta configuration server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File path to the configuration
    #[arg(short, long)]
    config_path: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    pretty_env_logger::init();
    let config = Config::read(&args.config_path);
    match config {
        Ok(Config {
            address,
            persistance,
            seed_path,
            password_file,
        }) => {
            let security = match &password_file {
                Some(path) => match Security::from_password_file(path) {
                    Ok(security) => security,
                    Err(err) => {
                        error!("Security error: {}", err);
                        return;
                    }
                },
                None => Security::disabled(),
            };
            let persistances = match persistance::build(persistance).await {
                Ok(persistances) => persistances,
                Err(err) => {
                    error!("Storage error: {}", err);
                    return;
                }
            };
            let service = match ConfigService::load(persistances, seed_path.as_deref()).await {
                Ok(service) => service,
                Err(err) => {
                    error!("Load error: {}", err);
                    return;
                }
            };
            warp::serve(
                warp::any()
                    .and(routes(service, security))
                    .with(cors())
                    .with(warp::log("api")),
            )
            .run(address)
            .await;
        }
        Err(err) => error!("Config error: {}", err),
    };
}

fn cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_headers(vec![
            "User-Agent",
            "Sec-Fetch-Mode",
            "Referer",
            "Origin",
            "Access-Control-Request-Method",
            "Access-Control-Request-Headers",
            "Content-Type",
            "Accept",
            "Authorization",
            "If-Match",
            "If-None-Match",
        ])
        .allow_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
        .expose_headers(vec!["ETag"])
}
