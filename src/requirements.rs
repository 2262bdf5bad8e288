//! Comparing openstack-ansible's global requirement pins with PyPI and the
//! OpenStack upper constraints.

use crate::{
    confirm::{remove_dir_confirmed, Confirm},
    git,
    upstream::REPO_PACKAGES,
    yaml,
};
use erreur::{ensure, Context, Result};
use lazy_regex::regex_is_match;
use reqwest::{blocking::Client, StatusCode};
use serde::Deserialize;
use std::{collections::BTreeMap, fmt, fs, path::Path};

pub const NOT_AVAILABLE: &str = "Not available.";

/// One line of a pip requirements file: `name[extras]<op><version>,...; markers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub specs: Vec<(String, String)>,
}

impl Requirement {
    pub fn parse_line(line: &str) -> Option<Requirement> {
        let line = match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('-') {
            return None;
        }

        let requirement = line.split(';').next().unwrap_or_default();
        let name_end = requirement
            .find(|c: char| "<>=!~[ (".contains(c))
            .unwrap_or_else(|| requirement.len());
        let name = requirement[..name_end].trim();
        if name.is_empty() {
            return None;
        }

        let mut rest = requirement[name_end..].trim_start();
        if rest.starts_with('[') {
            rest = rest.find(']').map_or("", |idx| &rest[idx + 1..]);
        }

        let specs = rest
            .trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace())
            .split(',')
            .map(str::trim)
            .filter(|spec| !spec.is_empty())
            .map(|spec| {
                let op_end = spec
                    .find(|c: char| !"<>=!~".contains(c))
                    .unwrap_or_else(|| spec.len());
                (spec[..op_end].to_string(), spec[op_end..].trim().to_string())
            })
            .collect();

        Some(Requirement {
            name: name.to_string(),
            specs,
        })
    }

    pub fn parse(text: &str) -> Vec<Requirement> {
        text.lines().filter_map(Requirement::parse_line).collect()
    }

    /// PEP 503 name comparison: case and `-_.` runs do not matter.
    pub fn same_project(&self, other: &str) -> bool {
        normalize(&self.name) == normalize(other)
    }

    pub fn specs_string(&self) -> String {
        self.specs
            .iter()
            .map(|(op, version)| format!("{}{}", op, version))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut separator = false;
    for c in name.chars() {
        if c == '-' || c == '_' || c == '.' {
            separator = true;
            continue;
        }
        if separator && !out.is_empty() {
            out.push('-');
        }
        separator = false;
        out.extend(c.to_lowercase());
    }
    out
}

/// Newest version without alpha, beta or release candidate markers.
pub fn latest_stable<'v>(versions: impl IntoIterator<Item = &'v str>) -> Option<String> {
    versions
        .into_iter()
        .filter(|version| !regex_is_match!("a|b|rc", version))
        .max_by(|a, b| human_sort::compare(a, b))
        .map(str::to_string)
}

/// Where the latest release of a Python package comes from.
pub trait LatestRelease {
    fn latest_release(&self, name: &str) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    releases: BTreeMap<String, serde_json::Value>,
}

/// PyPI's JSON API.
#[derive(Debug, Clone)]
pub struct PypiClient {
    base: String,
    http: Client,
}

impl PypiClient {
    pub fn new(base: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(crate::USER_AGENT)
            .build()
            .context("build HTTP client")?;
        Ok(PypiClient {
            base: base.trim_end_matches('/').to_string(),
            http,
        })
    }
}

impl LatestRelease for PypiClient {
    fn latest_release(&self, name: &str) -> Result<Option<String>> {
        let url = format!("{}/{}/json", self.base, name);
        let response = self
            .http
            .get(&url)
            .send()
            .with_context(|| format!("query PyPI for `{}`", name))?;
        if response.status() == StatusCode::NOT_FOUND {
            log::debug!("`{}` is not on PyPI", name);
            return Ok(None);
        }
        ensure!(
            response.status().is_success(),
            "PyPI answered {} for `{}`",
            response.status(),
            url
        );
        let info: ProjectInfo = response
            .json()
            .with_context(|| format!("decode PyPI metadata of `{}`", name))?;
        Ok(latest_stable(info.releases.keys().map(String::as_str)))
    }
}

/// What we know about one global requirement pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinReport {
    pub name: String,
    pub pin: String,
    pub latest: Option<String>,
    pub upper_constraint: Option<String>,
}

impl fmt::Display for PinReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Current global Requirement Pin: {}", self.pin)?;
        writeln!(
            f,
            "PyPI Latest version: {}",
            self.latest.as_deref().unwrap_or(NOT_AVAILABLE)
        )?;
        match &self.upper_constraint {
            Some(constraint) => writeln!(f, "Upper constraint from OpenStack requirements: {}", constraint),
            None => writeln!(f, "Constraint not found in OpenStack requirements"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RequirementsSource {
    requirements_git_repo: String,
    #[serde(deserialize_with = "yaml::deserialize_scalar_string")]
    requirements_git_install_branch: String,
}

/// Check every pin of `global-requirement-pins.txt` against PyPI and the
/// upper constraints of the requirements repo openstack-ansible follows.
pub fn check_global_requirement_pins(
    workdir: &Path,
    pypi: &dyn LatestRelease,
    confirm: &dyn Confirm,
) -> Result<Vec<PinReport>> {
    let oa_folder = workdir.join("openstack-ansible");
    let services_path = oa_folder.join(REPO_PACKAGES).join("openstack_services.yml");
    let (source, _): (RequirementsSource, _) = yaml::load_as(&services_path)?;

    log::info!("Downloading the requirements repo");
    let requirements_folder = workdir.join("requirements");
    remove_dir_confirmed(confirm, &requirements_folder)?;
    git::clone_at(
        &source.requirements_git_repo,
        &requirements_folder,
        &source.requirements_git_install_branch,
    )?;

    let constraints_path = requirements_folder.join("upper-constraints.txt");
    let constraints = Requirement::parse(
        &fs::read_to_string(&constraints_path)
            .with_context(|| format!("read `{}`", constraints_path.display()))?,
    );

    let pins_path = oa_folder.join("global-requirement-pins.txt");
    let pins = Requirement::parse(
        &fs::read_to_string(&pins_path).with_context(|| format!("read `{}`", pins_path.display()))?,
    );

    let mut reports = Vec::with_capacity(pins.len());
    for pin in &pins {
        let latest = pypi.latest_release(&pin.name)?;
        let upper_constraint = constraints
            .iter()
            .find(|constraint| pin.same_project(&constraint.name))
            .map(Requirement::specs_string);
        reports.push(PinReport {
            name: pin.name.clone(),
            pin: pin.specs_string(),
            latest,
            upper_constraint,
        });
    }
    Ok(reports)
}
