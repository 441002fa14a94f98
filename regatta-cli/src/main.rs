use clap::{Parser, Subcommand};
use reqwest::Client;

/// CLI to manage your regatta server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Server to which to connect to send the requests
    #[arg(short, long)]
    server: String,

    /// Credentials, as login:password
    #[arg(short, long)]
    user: Option<String>,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    PipelinesList,
    PipelineShow { name: String },
    PipelineCreate(PipelineCreateArgs),
    PipelineUpdate(PipelineUpdateArgs),
    PipelineDelete { name: String },
    TemplatesList,
    EnvironmentsList,
    UsersList,
}

#[derive(Parser, Debug)]
struct PipelineCreateArgs {
    /// Group the pipeline is created in
    #[arg(long)]
    group: String,
    /// Path to a JSON file with the pipeline definition
    #[arg(long)]
    payload: String,
}

#[derive(Parser, Debug)]
struct PipelineUpdateArgs {
    name: String,
    /// Path to a JSON file with the pipeline definition
    #[arg(long)]
    payload: String,
}

#[tokio::main]
async fn main() {
    let Args {
        server,
        user,
        commands,
    } = Args::parse();
    let client = Client::new();
    match commands {
        Commands::PipelinesList => {
            let url = format!("{}/api/admin/pipelines", server);
            let response = authorized(client.get(&url), &user).send().await.unwrap();
            let status = response.status();
            let body = response.text().await.unwrap();
            if !status.is_success() {
                print_pretty(&body);
                return;
            }
            let groups: Vec<regatta::PipelineGroup> = serde_json::from_str(&body).unwrap();
            if groups.is_empty() {
                println!("No pipelines yet, try creating one.");
            } else {
                print_pretty(&body);
            }
        }
        Commands::PipelineShow { name } => {
            let url = format!("{}/api/admin/pipelines/{}", server, name);
            let response = authorized(client.get(&url), &user).send().await.unwrap();
            print_pretty(&response.text().await.unwrap());
        }
        Commands::PipelineCreate(PipelineCreateArgs { group, payload }) => {
            let url = format!("{}/api/admin/pipelines", server);
            let pipeline: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(&payload).unwrap()).unwrap();
            let request = serde_json::json!({ "group": group, "pipeline": pipeline });
            let response = authorized(client.post(&url), &user)
                .body(request.to_string())
                .send()
                .await
                .unwrap();
            print_pretty(&response.text().await.unwrap());
        }
        Commands::PipelineUpdate(PipelineUpdateArgs { name, payload }) => {
            let url = format!("{}/api/admin/pipelines/{}", server, name);
            let response = authorized(client.get(&url), &user).send().await.unwrap();
            if !response.status().is_success() {
                println!("Failed to fetch pipeline '{}'.", name);
                print_pretty(&response.text().await.unwrap());
                return;
            }
            let etag = response
                .headers()
                .get("etag")
                .expect("response carries an entity tag")
                .to_str()
                .unwrap()
                .to_string();
            let body = std::fs::read_to_string(&payload).unwrap();
            let response = authorized(client.put(&url), &user)
                .header("If-Match", etag)
                .body(body)
                .send()
                .await
                .unwrap();
            print_pretty(&response.text().await.unwrap());
        }
        Commands::PipelineDelete { name } => {
            let url = format!("{}/api/admin/pipelines/{}", server, name);
            let response = authorized(client.delete(&url), &user).send().await.unwrap();
            print_pretty(&response.text().await.unwrap());
        }
        Commands::TemplatesList => {
            let url = format!("{}/api/admin/templates", server);
            let response = authorized(client.get(&url), &user).send().await.unwrap();
            print_pretty(&response.text().await.unwrap());
        }
        Commands::EnvironmentsList => {
            let url = format!("{}/api/admin/environments", server);
            let response = authorized(client.get(&url), &user).send().await.unwrap();
            print_pretty(&response.text().await.unwrap());
        }
        Commands::UsersList => {
            let url = format!("{}/api/admin/users", server);
            let response = authorized(client.get(&url), &user).send().await.unwrap();
            print_pretty(&response.text().await.unwrap());
        }
    }
}

fn authorized(request: reqwest::RequestBuilder, user: &Option<String>) -> reqwest::RequestBuilder {
    let request = request.header("Accept", regatta::MEDIA_TYPE);
    match user {
        Some(user) => {
            let (login, password) = user.split_once(':').expect("user must be login:password");
            request.basic_auth(login, Some(password))
        }
        None => request,
    }
}

fn print_pretty(body: &str) {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value).unwrap()),
        Err(_) => println!("{}", body),
    }
}
