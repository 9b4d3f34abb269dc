use super::*;
use taskdeck::config::DEFAULT_LOG_LEVEL;

#[test]
fn task_failure_hint_names_a_level_above_the_default() {
    let message = CliError::TaskFailed.to_string();
    let level = message
        .split("TASKDECK_LOG_LEVEL=")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .expect("hint names a level");

    let level: tracing::Level = level.parse().unwrap();
    // Levels compare by verbosity: a bigger level shows more.
    assert!(level > DEFAULT_LOG_LEVEL, "{level} is already shown by default");
}
