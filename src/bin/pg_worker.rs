//! Runs embedded `PostgreSQL` lifecycle steps on behalf of a root test run.
//!
//! ```text
//! pg_worker <setup|start|stop> <config-path>
//! ```
//!
//! `config-path` holds the JSON `WorkerPayload` written by
//! `pg-embed-setup-unpriv`. When started as root the worker switches to
//! `nobody` before touching the cluster, since `PostgreSQL` refuses to run as
//! the superuser.

#[cfg(unix)]
use camino::{Utf8Path, Utf8PathBuf};
#[cfg(unix)]
use nix::unistd::{Uid, User, initgroups, setgid, setuid};
#[cfg(unix)]
use pg_embedded_setup_unpriv::ambient_dir_and_path;
#[cfg(unix)]
use pg_embedded_setup_unpriv::worker::{PlainSecret, WorkerPayload};
#[cfg(unix)]
use postgresql_embedded::{PostgreSQL, Status};
#[cfg(unix)]
use std::ffi::CString;
#[cfg(unix)]
use std::io::Read;
#[cfg(unix)]
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[cfg(unix)]
const UNPRIVILEGED_USER: &str = "nobody";

#[cfg(unix)]
#[derive(Debug, Error)]
enum WorkerError {
    #[error("usage: pg_worker <setup|start|stop> <config-path> ({0})")]
    Usage(String),
    #[error("failed to read worker config {path}: {source}")]
    ConfigRead {
        path: Utf8PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("failed to parse worker config: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[error("invalid cluster settings: {0}")]
    Settings(String),
    #[error("failed to switch to user {user}: {reason}")]
    PrivilegeDrop { user: &'static str, reason: String },
    #[error("failed to build runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("postgres {step} failed: {reason}")]
    Lifecycle { step: &'static str, reason: String },
}

#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Setup,
    Start,
    Stop,
}

#[cfg(unix)]
impl Step {
    fn parse(value: &str) -> Result<Self, WorkerError> {
        match value {
            "setup" => Ok(Self::Setup),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            other => Err(WorkerError::Usage(format!("unknown step '{other}'"))),
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

#[cfg(unix)]
fn main() -> Result<(), BoxError> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let (step, config_path) = parse_args(&args)?;
    let payload = load_payload(&config_path)?;
    drop_privileges()?;
    run(step, payload).map_err(Into::into)
}

#[cfg(unix)]
fn parse_args(args: &[String]) -> Result<(Step, Utf8PathBuf), WorkerError> {
    match args {
        [step, config] => Ok((Step::parse(step)?, Utf8PathBuf::from(config))),
        _ => Err(WorkerError::Usage(format!(
            "expected 2 arguments, got {}",
            args.len()
        ))),
    }
}

#[cfg(unix)]
fn load_payload(path: &Utf8Path) -> Result<WorkerPayload, WorkerError> {
    let bytes = read_file(path).map_err(|source| WorkerError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(unix)]
fn read_file(path: &Utf8Path) -> Result<Vec<u8>, BoxError> {
    let (dir, relative) = ambient_dir_and_path(path)?;
    let mut file = dir.open(relative.as_std_path())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

#[cfg(unix)]
fn drop_privileges() -> Result<(), WorkerError> {
    if !Uid::effective().is_root() {
        return Ok(());
    }
    let fail = |reason: String| WorkerError::PrivilegeDrop {
        user: UNPRIVILEGED_USER,
        reason,
    };

    let user = User::from_name(UNPRIVILEGED_USER)
        .map_err(|err| fail(err.to_string()))?
        .ok_or_else(|| fail("no such user".to_owned()))?;
    let name = CString::new(user.name.clone()).map_err(|err| fail(err.to_string()))?;
    initgroups(&name, user.gid).map_err(|err| fail(err.to_string()))?;
    setgid(user.gid).map_err(|err| fail(err.to_string()))?;
    setuid(user.uid).map_err(|err| fail(err.to_string()))?;

    // SAFETY: the worker is single-threaded at this point.
    unsafe {
        std::env::set_var("HOME", &user.dir);
        std::env::set_var("USER", &user.name);
        std::env::set_var("LOGNAME", &user.name);
    }
    Ok(())
}

#[cfg(unix)]
fn apply_environment(environment: &[(String, Option<PlainSecret>)]) {
    for (key, value) in environment {
        // SAFETY: the worker is single-threaded until the runtime starts.
        unsafe {
            match value {
                Some(secret) => std::env::set_var(key, secret.expose()),
                None => std::env::remove_var(key),
            }
        }
    }
}

#[cfg(unix)]
fn run(step: Step, payload: WorkerPayload) -> Result<(), WorkerError> {
    let settings = payload
        .settings
        .into_settings()
        .map_err(|err| WorkerError::Settings(err.to_string()))?;
    apply_environment(&payload.environment);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(WorkerError::Runtime)?;

    let mut postgres = PostgreSQL::new(settings);
    runtime.block_on(async {
        match step {
            Step::Setup => {
                postgres.setup().await.map_err(|err| lifecycle(step, &err))?;
                start_if_stopped(&mut postgres).await
            }
            Step::Start => {
                start_if_stopped(&mut postgres).await?;
                // The server must outlive this process.
                let _server = std::mem::ManuallyDrop::new(postgres);
                Ok(())
            }
            Step::Stop => postgres.stop().await.map_err(|err| lifecycle(step, &err)),
        }
    })
}

#[cfg(unix)]
async fn start_if_stopped(postgres: &mut PostgreSQL) -> Result<(), WorkerError> {
    if matches!(postgres.status(), Status::Started) {
        return Ok(());
    }
    postgres
        .start()
        .await
        .map_err(|err| lifecycle(Step::Start, &err))
}

#[cfg(unix)]
fn lifecycle(step: Step, err: &impl std::fmt::Display) -> WorkerError {
    WorkerError::Lifecycle {
        step: step.as_str(),
        reason: err.to_string(),
    }
}

#[cfg(not(unix))]
fn main() -> Result<(), BoxError> {
    Err("pg_worker is only supported on Unix platforms".into())
}
