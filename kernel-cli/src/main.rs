//! `rfsn`: run a kernel session interactively or execute a single task
//! headlessly, grounded in `controller/run_task.py`'s `main()`.
//!
//! Exit codes follow the original's convention, expanded to this
//! workspace's error taxonomy: `0` on success, `1` when the final action
//! was gate-denied, `2` on an unrecoverable error (bad task file, store
//! that won't open).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kernel_session::{Session, SessionConfig};

#[derive(Parser)]
#[command(name = "rfsn", about = "Untrusted-reasoner orchestration kernel CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat loop against a reasoner, one line of stdin per turn.
    Chat {
        /// Working directory the session's filesystem capabilities are scoped to.
        #[arg(long, default_value = ".")]
        workdir: PathBuf,
        /// Where this session's ledger is written.
        #[arg(long, default_value = "session.jsonl")]
        ledger: PathBuf,
        /// Anthropic model to use; empty defers to the reasoner's default.
        #[arg(long, default_value = "")]
        model: String,
    },
    /// Run a single task deterministically and exit, the headless
    /// evaluation path (`controller/run_task.py`).
    RunTask {
        /// Path to a task JSON file: `{"id", "goal", "metadata"?}`.
        #[arg(long)]
        task: PathBuf,
        /// Random seed passed through to bandit arm selection.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Directory artifacts (ledger, result.json) are written to.
        #[arg(long, default_value = "./tmp/run")]
        out: PathBuf,
        /// Outcome store path for bandit learning.
        #[arg(long, default_value = "./tmp/outcomes.sqlite")]
        db: PathBuf,
    },
}

#[derive(serde::Deserialize)]
struct TaskFile {
    id: Option<String>,
    goal: String,
}

#[derive(serde::Serialize)]
struct TaskResult {
    success: bool,
    reward: f64,
    completed_steps: u32,
    total_steps: u32,
    wall_time_secs: f64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::try_init().ok();
    let cli = Cli::parse();
    match cli.command {
        Command::Chat { workdir, ledger, model } => run_chat(workdir, ledger, model).await,
        Command::RunTask { task, seed, out, db } => run_task(task, seed, out, db).await,
    }
}

fn build_reasoner(model: &str) -> Arc<dyn kernel_reasoner::Reasoner> {
    match std::env::var("ANTHROPIC_API_KEY") {
        Ok(key) => {
            let mut reasoner = kernel_reasoner::HttpReasoner::new(key);
            if !model.is_empty() {
                reasoner = reasoner.model(model);
            }
            Arc::new(reasoner)
        }
        Err(_) => {
            tracing::warn!("ANTHROPIC_API_KEY not set; falling back to a scripted reasoner");
            Arc::new(kernel_reasoner::ScriptedReasoner::new())
        }
    }
}

async fn run_chat(workdir: PathBuf, ledger: PathBuf, model: String) -> ExitCode {
    let dev_mode = std::env::var("RFSN_DEV_MODE").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    let config = SessionConfig {
        policy: kernel_policy::Policy::restrictive_default(),
        working_directory: workdir.to_string_lossy().to_string(),
        ledger_path: ledger.to_string_lossy().to_string(),
        default_model: model.clone(),
        dev_mode,
        ..SessionConfig::default()
    };
    let mut session = match Session::new(config, build_reasoner(&model)) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("failed to start session: {e}");
            return ExitCode::from(2);
        }
    };

    println!("rfsn chat — session {}. Ctrl-D to exit.", session.id);
    let mut input = String::new();
    loop {
        input.clear();
        print!("> ");
        use std::io::Write;
        std::io::stdout().flush().ok();
        let bytes = match std::io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if bytes == 0 {
            break;
        }
        let text = input.trim();
        if text.is_empty() {
            continue;
        }
        let result = session.step(text).await;
        println!("{}", result.reply);
    }
    ExitCode::SUCCESS
}

async fn run_task(task_path: PathBuf, seed: u64, out: PathBuf, db: PathBuf) -> ExitCode {
    let raw = match std::fs::read_to_string(&task_path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("failed to read task file {}: {e}", task_path.display());
            return ExitCode::from(2);
        }
    };
    let task: TaskFile = match serde_json::from_str(&raw) {
        Ok(task) => task,
        Err(e) => {
            eprintln!("failed to parse task file: {e}");
            return ExitCode::from(2);
        }
    };
    if let Err(e) = std::fs::create_dir_all(&out) {
        eprintln!("failed to create output directory: {e}");
        return ExitCode::from(2);
    }

    let task_id = task.id.unwrap_or_else(|| "task".to_string());
    println!("Running task: {task_id}");
    println!("Goal: {}", task.goal);
    println!("Seed: {seed}");
    println!();

    let config = SessionConfig {
        policy: kernel_policy::Policy::restrictive_default(),
        working_directory: out.to_string_lossy().to_string(),
        ledger_path: out.join("ledger.jsonl").to_string_lossy().to_string(),
        outcomes_db_path: Some(db.to_string_lossy().to_string()),
        ..SessionConfig::default()
    };
    let mut session = match Session::new(config, Arc::new(kernel_reasoner::ScriptedReasoner::new())) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("failed to start session: {e}");
            return ExitCode::from(2);
        }
    };

    let started = std::time::Instant::now();
    let plan_result = session.run_goal(&task.goal, None).await;
    let wall_time_secs = started.elapsed().as_secs_f64();

    let reward = kernel_planner_reward(&plan_result);
    let result = TaskResult {
        success: plan_result.success,
        reward,
        completed_steps: plan_result.completed_steps,
        total_steps: plan_result.total_steps,
        wall_time_secs,
    };

    println!("===== RESULT =====");
    println!("Success: {}", result.success);
    println!("Reward:  {:.3}", result.reward);
    println!("Steps:   {}/{}", result.completed_steps, result.total_steps);
    println!("Time:    {:.2}s", result.wall_time_secs);

    if let Err(e) = std::fs::write(out.join("result.json"), serde_json::to_string_pretty(&result).unwrap()) {
        eprintln!("failed to write result.json: {e}");
        return ExitCode::from(2);
    }

    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn kernel_planner_reward(result: &kernel_planner::PlanResult) -> f64 {
    kernel_planner::reward_from_plan_result(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_file_parses_the_minimal_shape() {
        let task: TaskFile = serde_json::from_str(r#"{"id": "t1", "goal": "list files"}"#).unwrap();
        assert_eq!(task.id, Some("t1".to_string()));
        assert_eq!(task.goal, "list files");
    }

    #[test]
    fn task_file_tolerates_extra_fields_and_a_missing_id() {
        let task: TaskFile = serde_json::from_str(r#"{"goal": "g", "metadata": {"x": 1}}"#).unwrap();
        assert_eq!(task.id, None);
        assert_eq!(task.goal, "g");
    }

    #[tokio::test]
    async fn run_task_writes_a_result_file_and_succeeds_on_a_trivial_goal() {
        let dir = tempfile::tempdir().unwrap();
        let task_path = dir.path().join("task.json");
        std::fs::write(&task_path, r#"{"id": "t1", "goal": "list the files here"}"#).unwrap();
        let out = dir.path().join("out");
        let db = dir.path().join("outcomes.sqlite");

        let code = run_task(task_path, 7, out.clone(), db).await;

        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::SUCCESS));
        assert!(out.join("result.json").exists());
    }
}
