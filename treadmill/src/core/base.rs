//! Fork-point comparison between the local branch and a harvested branch.

/// How the local branch's fork point relates to the remote branch's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseRelation {
    /// Both branches forked from the same integration commit.
    Same,
    /// The remote branch is based on newer integration history.
    RemoteNewer,
    /// The local branch is based on newer (or unrelated) history.
    LocalNewer,
}

/// What the harvester does about a given relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseDecision {
    Proceed,
    ProceedWithNote,
    Stop,
}

/// Classify fork points.
///
/// `local_is_ancestor_of_remote` is only consulted when the fork points differ.
pub fn classify_base<E>(
    local_fork_point: &str,
    remote_fork_point: &str,
    local_is_ancestor_of_remote: impl FnOnce() -> Result<bool, E>,
) -> Result<BaseRelation, E> {
    if local_fork_point == remote_fork_point {
        return Ok(BaseRelation::Same);
    }
    if local_is_ancestor_of_remote()? {
        return Ok(BaseRelation::RemoteNewer);
    }
    Ok(BaseRelation::LocalNewer)
}

/// Decide whether to cherry-pick over the given relation.
pub fn decide(relation: BaseRelation, accept_stale_base: bool) -> BaseDecision {
    match relation {
        BaseRelation::Same => BaseDecision::Proceed,
        BaseRelation::LocalNewer => BaseDecision::ProceedWithNote,
        BaseRelation::RemoteNewer if accept_stale_base => BaseDecision::ProceedWithNote,
        BaseRelation::RemoteNewer => BaseDecision::Stop,
    }
}
