//! Academic Service Maintenance CLI
//!
//! Operator tasks that should not go through the HTTP API: running
//! migrations, bootstrapping the first super-administrator and resetting
//! passwords by hand.

use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use sqlx::PgPool;

use academic_service::{
    config::SecurityConfig,
    database::DatabaseConfig,
    service::AuthService,
    utils::{
        security::{generate_password, hash_password_with_cost},
        validation::validate_password_strength,
    },
};

const GENERATED_PASSWORD_LENGTH: usize = 12;

/// Academic service maintenance CLI
#[derive(Parser)]
#[command(
    name = "academic-admin",
    about = "Maintenance tasks for the academic service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create a super-administrator account
    CreateSuperadmin(CreateSuperadminArgs),
    /// Print the bcrypt hash of a password
    HashPassword(HashPasswordArgs),
    /// Overwrite the password of an account
    ResetPassword(ResetPasswordArgs),
}

#[derive(Args)]
struct CreateSuperadminArgs {
    /// Login email of the new account
    #[arg(short, long)]
    email: String,

    /// Password: 8+ characters with upper case, lower case and a digit
    #[arg(short, long)]
    password: String,
}

#[derive(Args)]
struct HashPasswordArgs {
    /// Plain text password to hash
    password: String,
}

#[derive(Args)]
struct ResetPasswordArgs {
    /// Login email of the account
    #[arg(short, long)]
    email: String,

    /// New password; a random one is generated and printed when omitted
    #[arg(short, long)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let security = SecurityConfig::from_env()?;

    match cli.command {
        Commands::Migrate => {
            let pool = connect().await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::CreateSuperadmin(args) => {
            let auth = AuthService::with_bcrypt_cost(connect().await?, security.bcrypt_cost);
            let user_id = auth.create_super_admin(&args.email, &args.password).await?;
            println!("Super administrator {} created with id {}", args.email, user_id);
        }
        Commands::HashPassword(args) => {
            println!("{}", hash_password_with_cost(&args.password, security.bcrypt_cost)?);
        }
        Commands::ResetPassword(args) => reset_password(args, security.bcrypt_cost).await?,
    }

    Ok(())
}

async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    let config = DatabaseConfig::from_env()?;
    Ok(config.create_pool().await?)
}

async fn reset_password(
    args: ResetPasswordArgs,
    bcrypt_cost: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let (password, generated) = match args.password {
        Some(password) => {
            if !validate_password_strength(&password) {
                return Err(
                    "Password must have 8+ characters with upper, lower case and a digit".into(),
                );
            }
            (password, false)
        }
        None => (strong_random_password(), true),
    };

    let auth = AuthService::with_bcrypt_cost(connect().await?, bcrypt_cost);
    auth.reset_password(&args.email, &password).await?;

    if generated {
        println!("Password for {} reset to: {}", args.email, password);
    } else {
        println!("Password for {} reset", args.email);
    }
    Ok(())
}

/// Random password that also passes the strength rules
fn strong_random_password() -> String {
    loop {
        let candidate = generate_password(GENERATED_PASSWORD_LENGTH);
        if validate_password_strength(&candidate) {
            return candidate;
        }
    }
}
