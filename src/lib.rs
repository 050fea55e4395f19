/*!
opipes: pipeline-aware command wrapper.

Each stage of `o cmd1 | o cmd2 | o cmd3` negotiates with its neighbors over the shell pipes
before running its command: adjacent stages switch to a private Unix-domain socket for the
real data, and every stage learns the full invocation of everything downstream of it, so it
can rewrite its own arguments (see [`rewrite`]) before it runs.

Flow for one stage: [`Session::init`] → [`Session::establish_pipe`] →
[`Rewriter::substitute`] → [`bridge::run`].
*/

pub mod bridge;
pub mod cli;
pub mod endpoint;
pub mod errors;
pub mod handshake;
pub mod logging;
pub mod meta;
pub mod rewrite;
pub mod session;
pub mod util;

pub use bridge::BridgeOutcome;
pub use endpoint::{PipeReader, PipeWriter};
pub use errors::{Direction, PipeError, FATAL_EXIT_CODE};
pub use handshake::Pipe;
pub use meta::{PipelineNode, UpstreamAddress, MAX_CHAIN_DEPTH};
pub use rewrite::{filter_pushdown, grep_pushdown, Rewriter, FILTER_PLACEHOLDER};
pub use session::Session;
pub use util::{shell_escape, shell_join};
