use semver::Version;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::container::split_reference;

/// Semantic version of an image tag, with an optional leading `v`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ImageVersion(Version);

impl FromStr for ImageVersion {
    type Err = semver::Error;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let tag = tag.trim();
        Version::parse(tag.strip_prefix('v').unwrap_or(tag)).map(ImageVersion)
    }
}

impl fmt::Display for ImageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Pick the probe image tag to run
///
/// The higher of the agent's tag and the last probe tag wins. If either is
/// missing or not a semantic version, `default_tag` is used.
pub fn resolve_tag(agent_tag: Option<&str>, probe_tag: Option<&str>, default_tag: &str) -> String {
    let versions = match (agent_tag, probe_tag) {
        (Some(agent), Some(probe)) => agent
            .parse::<ImageVersion>()
            .ok()
            .zip(probe.parse::<ImageVersion>().ok())
            .map(|(agent_version, probe_version)| (agent, agent_version, probe, probe_version)),
        _ => None,
    };

    let Some((agent, agent_version, probe, probe_version)) = versions else {
        debug!(
            agent_tag = ?agent_tag,
            probe_tag = ?probe_tag,
            default_tag,
            "cannot compare image versions, using default tag"
        );
        return default_tag.to_string();
    };

    let tag = if agent_version >= probe_version { agent } else { probe };
    tag.trim().to_string()
}

/// Tag of the first image reference whose repository is `repository`
pub fn tag_for_repository<'a>(images: &'a [String], repository: &str) -> Option<&'a str> {
    images.iter().find_map(|image| match split_reference(image) {
        (repo, Some(tag)) if repo == repository => Some(tag),
        _ => None,
    })
}

/// Highest semantic-version tag among the images of `repository`
///
/// When tags exist but none parse, the first one is returned so that the
/// caller's fallback rule applies.
pub fn highest_tag<'a>(images: &'a [String], repository: &str) -> Option<&'a str> {
    let tags: Vec<&str> = images
        .iter()
        .filter_map(|image| match split_reference(image) {
            (repo, Some(tag)) if repo == repository => Some(tag),
            _ => None,
        })
        .collect();

    tags.iter()
        .filter_map(|tag| tag.parse::<ImageVersion>().ok().map(|version| (version, *tag)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, tag)| tag)
        .or_else(|| tags.first().copied())
}
