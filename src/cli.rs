use crate::{refs::PatchOrdering, release::VersionRequest};
use std::path::PathBuf;
use structopt::StructOpt;

/// Release chores for OpenStack-Ansible maintainers
#[derive(Debug, StructOpt)]
pub struct Cli {
    /// Directory holding the checkouts the commands work on
    #[structopt(
        short = "w",
        long = "workdir",
        env = "OSA_TOOLKIT_WORKDIR",
        default_value = "/tmp/newcode",
        parse(from_os_str)
    )]
    pub workdir: PathBuf,
    /// YAML file overriding the built-in settings
    #[structopt(long = "config", env = "OSA_TOOLKIT_CONFIG", parse(from_os_str))]
    pub config: Option<PathBuf>,
    /// Answer yes to every confirmation
    #[structopt(short = "y", long = "yes")]
    pub yes: bool,
    #[structopt(subcommand)]
    pub cmd: Command,
    /// Print more debug output
    #[structopt(short = "v", long = "verbose")]
    pub verbose: bool,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// List bugs waiting for triage, formatted for the meeting
    BugTriage {
        /// Bug task statuses to include [default: New]
        #[structopt(long = "status")]
        statuses: Vec<String>,
        #[structopt(long, default_value = "-datecreated", allow_hyphen_values = true)]
        order_by: String,
    },
    /// Regenerate the role maturity matrix in openstack-ansible
    MaturityMatrix {
        /// Commit the result in openstack-ansible
        #[structopt(long)]
        commit: bool,
    },
    /// Add a release of openstack-ansible to the releases repo
    UpdateOsReleaseFile {
        /// Series codename, like `pike`
        #[structopt(long)]
        branch: String,
        #[structopt(long)]
        version: VersionRequest,
        /// Commit the result in the releases repo
        #[structopt(long)]
        commit: bool,
    },
    /// Point OpenStack services in repo_packages at their branch heads
    BumpUpstreamSources {
        #[structopt(flatten)]
        message: CommitMessage,
    },
    /// Compare global requirement pins with PyPI and upper constraints
    CheckGlobalRequirements,
    /// Freeze ansible-role-requirements.yml to exact commits
    BumpArr {
        /// Also pin roles hosted outside OpenStack
        #[structopt(long)]
        external_roles: bool,
        /// Do not copy role release notes into openstack-ansible
        #[structopt(long)]
        no_release_notes: bool,
        #[structopt(flatten)]
        message: CommitMessage,
    },
    /// Set openstack_release in openstack-ansible
    BumpReleaseNumber {
        /// `auto` for the next patch version, or an explicit version
        #[structopt(long, default_value)]
        version: VersionRequest,
        /// Commit the result in openstack-ansible
        #[structopt(long)]
        commit: bool,
    },
    /// Resolve a reference of a remote repository to a commit or tag
    ResolveRef {
        /// Repository URL
        url: String,
        /// Branch or tag, like `stable/pike` or `16.0.1`
        reference: String,
        /// Only accept exact matches and end-of-life tags
        #[structopt(long)]
        no_guess: bool,
        /// `lexicographic` or `numeric`, overrides the configuration
        #[structopt(long)]
        ordering: Option<PatchOrdering>,
    },
}

/// Values for the suggested commit message.
#[derive(Debug, StructOpt)]
pub struct CommitMessage {
    #[structopt(long, env = "new_version", default_value = "<NEW VERSION>")]
    pub new_version: String,
    #[structopt(long = "release-changeid", env = "release_changeid", default_value = "<TODO>")]
    pub release_change_id: String,
}
