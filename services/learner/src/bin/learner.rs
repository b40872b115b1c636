//! services/learner/src/bin/learner.rs

use learner_lib::{
    adapters::{BackendClient, HttpGenerationAdapter, HttpIdentityAdapter, HttpProgressAdapter},
    config::Config,
    error::ClientError,
    session::{AppServices, SessionController, SessionError, SessionPhase},
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vocab_core::domain::{QuizOutcome, Tier};

const HELP: &str = "\
Commands:
  login <email> <password>
  signup <email> <password> [free|paid]
  learn <word>          (also: next <word>)
  answer <choice|number>
  retry
  progress
  status
  logout
  quit";

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Backend at {}", config.api_base_url);

    // --- 2. Initialize Service Adapters ---
    let client = BackendClient::new(config.api_base_url.clone(), config.request_timeout)?;
    let services = AppServices {
        identity: Arc::new(HttpIdentityAdapter::new(client.clone())),
        generation: Arc::new(HttpGenerationAdapter::new(client.clone())),
        progress: Arc::new(HttpProgressAdapter::new(client)),
        config,
    };

    // --- 3. Start the Session ---
    let mut controller = SessionController::new(services);
    info!("Session {} started.", controller.session_id());
    println!("{}\n", HELP);
    if controller.begin_resolve() {
        println!("Signing you back in...");
    } else {
        render(&controller);
    }

    // --- 4. Run the Input Loop ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(&mut controller, line.trim()) {
                    break;
                }
            }
            Some(event) = controller.recv_event() => {
                if controller.apply(event) {
                    show_update(&mut controller);
                }
            }
        }
    }

    controller.flush_progress().await;
    info!("Session {} ended.", controller.session_id());
    Ok(())
}

/// Runs one command line without waiting on the network. Returns `false`
/// when the learner wants to quit.
fn handle_command(controller: &mut SessionController, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return true;
    };
    let rest: Vec<&str> = parts.collect();

    let result = match (command.to_lowercase().as_str(), rest.as_slice()) {
        ("quit" | "exit", _) => return false,
        ("help", _) => {
            println!("{}", HELP);
            return true;
        }
        ("login", [email, password]) => {
            controller.begin_login(email, password);
            println!("Signing in...");
            return true;
        }
        ("signup", [email, password]) => {
            controller.begin_signup(email, password, Tier::Free);
            println!("Creating your account...");
            return true;
        }
        ("signup", [email, password, tier]) => match tier.parse::<Tier>() {
            Ok(tier) => {
                controller.begin_signup(email, password, tier);
                println!("Creating your account...");
                return true;
            }
            Err(e) => {
                println!("{}", e);
                return true;
            }
        },
        ("learn" | "next", words) if !words.is_empty() => {
            controller.submit_word(&words.join(" ")).map(|_| ())
        }
        ("answer", choice) if !choice.is_empty() => {
            let choice = resolve_choice(controller, &choice.join(" "));
            controller.answer(&choice).map(|_| ())
        }
        ("retry", []) => controller.retry(),
        ("progress", []) => match controller.request_progress() {
            Ok(()) => {
                println!("Loading your progress...");
                return true;
            }
            Err(e) => Err(e),
        },
        ("status", []) => Ok(()),
        ("logout", []) => {
            controller.logout();
            Ok(())
        }
        _ => {
            println!("Unrecognised command. Type 'help' for the list.");
            return true;
        }
    };

    match result {
        Ok(()) => render(controller),
        Err(e) => report(&e),
    }
    true
}

/// Shows whatever a finished background request changed.
fn show_update(controller: &mut SessionController) {
    if let Some(error) = controller.take_failure() {
        report(&error);
    }
    if let Some(summary) = controller.take_progress_summary() {
        println!(
            "Words learned: {}  Average score: {:.0}",
            summary.words_learned, summary.average_score
        );
        for record in &summary.records {
            println!(
                "  {}  {} word(s)  score {}",
                record.date, record.words_learned, record.quiz_score
            );
        }
        return;
    }
    render(controller);
}

/// Maps a 1-based option number onto the option text.
fn resolve_choice(controller: &SessionController, choice: &str) -> String {
    let options = controller.artifact().map(|a| a.quiz.options());
    match (options, choice.parse::<usize>()) {
        (Some(options), Ok(n)) if n >= 1 && n <= options.len() => options[n - 1].clone(),
        _ => choice.to_string(),
    }
}

fn report(error: &SessionError) {
    info!("Action failed: {}", error);
    println!("{}", error.user_message());
}

fn render(controller: &SessionController) {
    match controller.phase() {
        SessionPhase::Unauthenticated => {
            println!("You're signed out. Use: login <email> <password>");
        }
        SessionPhase::Loading => println!("Loading your profile..."),
        SessionPhase::Ready => {
            if let Some(profile) = controller.profile() {
                println!("Hi {}! Type: learn <word>", profile.email);
            }
            print_quota(controller);
        }
        SessionPhase::Generating { word, .. } => {
            println!("Making a lesson for '{}'...", word);
        }
        SessionPhase::Answering => {
            if let Some(artifact) = controller.artifact() {
                println!("\n📖 {}", artifact.sentence);
                println!("🖼️  {}", artifact.image_url);
                println!("\n{}", artifact.quiz.question());
                for (i, option) in artifact.quiz.options().iter().enumerate() {
                    println!("  {}. {}", i + 1, option);
                }
            }
        }
        SessionPhase::Answered(QuizOutcome::Correct) => {
            println!("🎉 Correct! Type: next <word>");
            print_quota(controller);
        }
        SessionPhase::Answered(QuizOutcome::Incorrect) => {
            println!("Not quite. Try another answer.");
        }
        SessionPhase::Answered(QuizOutcome::Unanswered) => {}
        SessionPhase::Errored { error, .. } => {
            println!("{}", error.user_message());
            if error.is_retryable() {
                println!("Type 'retry' to try again.");
            }
        }
    }
}

fn print_quota(controller: &SessionController) {
    if let Some(hint) = controller.quota_hint() {
        println!(
            "({} of {} free words used, {} left today)",
            hint.used_this_session,
            hint.daily_limit,
            hint.remaining()
        );
    }
}
