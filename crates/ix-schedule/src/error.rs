use ix_track::Arm;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("no track leaves pocket {0:?}")]
    EmptyPocket(Arm),

    #[error("cannot schedule {0} agents")]
    AgentCount(usize),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
