use crate::registry::ServiceKind;
use anyhow::Result;
use futures::stream::BoxStream;
use tasksync::Issue;

/// Lazy, finite sequence of issues produced by one service pass.
pub type IssueStream<'a> = BoxStream<'a, Result<Box<dyn Issue>>>;

/// Service interface for issue-tracker integrations.
///
/// Every tracker integration implements this trait so the collector can
/// drain it without knowing which tracker it talks to. A service instance
/// holds only its validated config and its authenticated session; it is
/// built for one pull pass and then dropped.
///
/// # Lifecycle
/// 1. The registry validates the target section and builds the service
///    (credential resolution and any auth probing happen here)
/// 2. The collector calls `issues()` and polls the stream
/// 3. Each record is fetched and mapped only when the stream is polled
/// 4. The collector renders every issue into a normalized record
///
/// # Example
/// ```no_run
/// use connector_manager::{IssueStream, Service, ServiceKind};
/// use futures::stream::{self, StreamExt};
///
/// struct EmptyService;
///
/// impl Service for EmptyService {
///     fn target(&self) -> &str {
///         "empty"
///     }
///
///     fn kind(&self) -> ServiceKind {
///         ServiceKind::Redmine
///     }
///
///     fn issues(&self) -> IssueStream<'_> {
///         stream::empty().boxed()
///     }
/// }
/// ```
pub trait Service: Send + Sync {
    /// Returns the config section name this service was built from.
    fn target(&self) -> &str;

    /// Returns which tracker this service talks to.
    ///
    /// The kind carries the UDA table and unique key for the records.
    fn kind(&self) -> ServiceKind;

    /// Returns the lazy issue stream for this pass.
    ///
    /// # Error Handling
    /// - Gerrit, Redmine, Pivotal Tracker: a transport or decode error is
    ///   yielded once and ends the stream
    /// - Phabricator: API errors are logged and the affected half of the
    ///   stream ends empty
    fn issues(&self) -> IssueStream<'_>;
}
