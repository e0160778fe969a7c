//! Given steps for deferred write BDD scenarios.

use super::world::{WriteWorld, instant, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use taskdeck::task::{ports::WriteOutcome, services::CreateTaskRequest};

#[given(r#"the clock reads "{timestamp}""#)]
fn clock_reads(world: &mut WriteWorld, timestamp: String) -> Result<(), eyre::Report> {
    world.clock.set(instant(&timestamp)?);
    Ok(())
}

#[given(r#"a task titled "{title}" written at "{timestamp}""#)]
fn task_written_at(
    world: &mut WriteWorld,
    title: String,
    timestamp: String,
) -> Result<(), eyre::Report> {
    let outcome = run_async(
        world
            .service
            .create(CreateTaskRequest::new(title, timestamp)),
    )
    .wrap_err("create scenario task")?;
    let WriteOutcome::Created(task) = outcome else {
        return Err(eyre::eyre!("expected an immediate create, got {outcome:?}"));
    };
    world.task_id = Some(task.id());
    Ok(())
}
