use accountgate::{
    config::AppConfig,
    db,
    repositories::SqliteUserRepository,
    services::{
        create_email_service, CreateUserRequest, EmailTokenSigner, UserService,
        UserServiceError, VerificationOutcome,
    },
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "accountgate-cli")]
#[command(about = "CLI tool for managing Accountgate users", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,

        /// Mark email as verified
        #[arg(long)]
        verified: bool,

        /// Grant access to the admin page
        #[arg(long)]
        admin: bool,
    },

    /// List all users
    List,

    /// Verify a user's email
    Verify {
        /// Email address of the user to verify
        #[arg(short, long)]
        email: String,
    },

    /// Grant or revoke admin access
    SetAdmin {
        /// Email address of the user
        #[arg(short, long)]
        email: String,

        /// Remove admin access instead of granting it
        #[arg(long)]
        revoke: bool,
    },

    /// Set a new password for a user
    SetPassword {
        /// Email address of the user
        #[arg(short, long)]
        email: String,

        /// New password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Hash any passwords still stored in plaintext
    RehashPasswords,
}

fn get_password(prompt: &str) -> anyhow::Result<String> {
    use std::io::{self, Write};
    print!("{}: ", prompt);
    io::stdout().flush()?;

    Ok(rpassword::read_password()?)
}

fn prompt_new_password(prompt: &str) -> anyhow::Result<String> {
    let password = get_password(prompt)?;
    let confirm = get_password("Confirm password")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}

fn fail(action: &str, err: UserServiceError) -> ! {
    match err {
        UserServiceError::UserNotFound => eprintln!("❌ {}: user not found", action),
        other => eprintln!("❌ {}: {}", action, other),
    }
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accountgate=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Invalid configuration")?;

    // Connect to database
    let pool = db::create_pool(&config.database_url).await?;

    // Run migrations
    db::run_migrations(&pool).await?;

    // Initialize services
    let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
    let user_service = UserService::new(
        user_repository,
        Arc::new(EmailTokenSigner::new(config.secret_key.clone())),
        create_email_service(config.smtp.as_ref())?,
        config.base_url.clone(),
    );

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Create {
                email,
                password,
                verified,
                admin,
            } => {
                let password = match password {
                    Some(pw) => pw,
                    None => prompt_new_password("Password")?,
                };

                let request = CreateUserRequest {
                    email,
                    password,
                    email_verified: verified,
                    is_admin: admin,
                };

                match user_service.create_user(request).await {
                    Ok(user) => {
                        println!("✅ User created successfully!");
                        println!("  ID: {}", user.id);
                        println!("  Email: {}", user.email);
                        println!("  Verified: {}", user.email_verified);
                        println!("  Admin: {}", user.is_admin);
                    }
                    Err(err) => fail("Failed to create user", err),
                }
            }

            UserCommands::List => match user_service.list_users().await {
                Ok(users) if users.is_empty() => println!("No users found."),
                Ok(users) => {
                    println!(
                        "{:<5} {:<40} {:<10} {:<7} {:<20}",
                        "ID", "Email", "Verified", "Admin", "Created"
                    );
                    println!("{}", "-".repeat(85));
                    for user in users {
                        println!(
                            "{:<5} {:<40} {:<10} {:<7} {:<20}",
                            user.id,
                            user.email,
                            if user.email_verified { "Yes" } else { "No" },
                            if user.is_admin { "Yes" } else { "No" },
                            user.created_display()
                        );
                    }
                }
                Err(err) => fail("Failed to list users", err),
            },

            UserCommands::Verify { email } => match user_service.mark_verified(&email).await {
                Ok(VerificationOutcome::Verified(_)) => {
                    println!("✅ User '{}' email verified successfully!", email);
                }
                Ok(VerificationOutcome::AlreadyVerified(_)) => {
                    println!("ℹ️  User '{}' is already verified", email);
                }
                Err(err) => fail("Failed to verify user", err),
            },

            UserCommands::SetAdmin { email, revoke } => {
                match user_service.set_admin(&email, !revoke).await {
                    Ok(user) if user.is_admin => {
                        println!("✅ User '{}' is now an admin", email);
                    }
                    Ok(_) => println!("✅ Admin access revoked for '{}'", email),
                    Err(err) => fail("Failed to update admin flag", err),
                }
            }

            UserCommands::SetPassword { email, password } => {
                let new_password = match password {
                    Some(pw) => pw,
                    None => prompt_new_password("New password")?,
                };

                match user_service.update_password(&email, &new_password).await {
                    Ok(()) => println!("✅ Password updated successfully for '{}'!", email),
                    Err(err) => fail("Failed to update password", err),
                }
            }

            UserCommands::RehashPasswords => {
                match user_service.rehash_legacy_passwords().await {
                    Ok(report) => {
                        println!("✅ Password migration finished");
                        println!("  Rehashed: {}", report.rehashed);
                        println!("  Already hashed: {}", report.already_hashed);
                        if report.skipped_bcrypt > 0 {
                            println!(
                                "ℹ️  {} bcrypt hashes will be upgraded at their owners' next login",
                                report.skipped_bcrypt
                            );
                        }
                    }
                    Err(err) => fail("Failed to migrate passwords", err),
                }
            }
        },
    }

    Ok(())
}
