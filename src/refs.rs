//! Resolving a dependency reference against the refs a git remote advertises.
//!
//! A reference is either a branch name (`master`, `stable/pike`) or a dotted
//! version (`16.1.9`). Branches resolve to the sha of their head, a
//! `stable/<codename>` branch that was retired resolves to its `<codename>-eol`
//! tag, and a version resolves to the highest patch release sharing all other
//! components.

use lazy_regex::regex;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{cmp::Ordering, fmt, str::FromStr};

const BRANCH_PREFIX: &str = "refs/heads/";
const TAG_PREFIX: &str = "refs/tags/";
const STABLE_PREFIX: &str = "stable/";
const EOL_SUFFIX: &str = "-eol";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Branch,
    Tag,
}

/// One entry of a remote listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteRef {
    pub sha: SmolStr,
    pub kind: RefKind,
    pub name: SmolStr,
}

impl RemoteRef {
    pub fn branch(sha: &str, name: &str) -> Self {
        RemoteRef {
            sha: sha.into(),
            kind: RefKind::Branch,
            name: name.into(),
        }
    }

    pub fn tag(sha: &str, name: &str) -> Self {
        RemoteRef {
            sha: sha.into(),
            kind: RefKind::Tag,
            name: name.into(),
        }
    }

    /// Classify a full ref name (`refs/heads/…`, `refs/tags/…`).
    ///
    /// Tags only qualify when they look like a release: ending with a digit
    /// (`16.1.9`, `1.11.1rc1`) or with `-eol`. Everything else (notes, pull
    /// request refs, `latest` style tags) yields `None`.
    pub fn from_ref_name(sha: &str, full_name: &str) -> Option<Self> {
        if let Some(branch) = full_name.strip_prefix(BRANCH_PREFIX) {
            return Some(RemoteRef::branch(sha, branch));
        }

        let tag = full_name.strip_prefix(TAG_PREFIX)?;
        if is_release_tag(tag) {
            Some(RemoteRef::tag(sha, tag))
        } else {
            None
        }
    }

    /// Parse one line of `git ls-remote` output: `<sha>\t<full ref name>`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let caps = regex!(r"^([0-9a-f]{40})\t(\S+)$").captures(line.trim_end())?;
        RemoteRef::from_ref_name(&caps[1], &caps[2])
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let prefix = match self.kind {
            RefKind::Branch => BRANCH_PREFIX,
            RefKind::Tag => TAG_PREFIX,
        };
        write!(f, "{}\t{}{}", self.sha, prefix, self.name)
    }
}

fn is_release_tag(name: &str) -> bool {
    name.ends_with(EOL_SUFFIX) || name.chars().last().map_or(false, |c| c.is_ascii_digit())
}

/// Parse a whole `git ls-remote` listing, skipping lines that do not qualify.
pub fn parse_listing(listing: &str) -> Vec<RemoteRef> {
    listing.lines().filter_map(RemoteRef::parse_line).collect()
}

/// How candidate patch components are ranked against each other.
///
/// `Lexicographic` (the default) is plain string ordering, so `"9"` beats
/// `"10"`. `Numeric` ranks components that are whole numbers by value, above
/// any that are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOrdering {
    Lexicographic,
    Numeric,
}

impl Default for PatchOrdering {
    fn default() -> Self {
        PatchOrdering::Lexicographic
    }
}

impl PatchOrdering {
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            PatchOrdering::Lexicographic => a.cmp(b),
            PatchOrdering::Numeric => match (a.parse::<u64>(), b.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
                (Ok(_), Err(_)) => Ordering::Greater,
                (Err(_), Ok(_)) => Ordering::Less,
                (Err(_), Err(_)) => a.cmp(b),
            },
        }
    }
}

impl FromStr for PatchOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lexicographic" => Ok(PatchOrdering::Lexicographic),
            "numeric" => Ok(PatchOrdering::Numeric),
            other => Err(format!(
                "unknown patch ordering `{}`, expected `lexicographic` or `numeric`",
                other
            )),
        }
    }
}

impl fmt::Display for PatchOrdering {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PatchOrdering::Lexicographic => write!(f, "lexicographic"),
            PatchOrdering::Numeric => write!(f, "numeric"),
        }
    }
}

/// Settings for [`Resolver::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolver {
    /// Allow approximate tag matching on the last version component.
    pub guess: bool,
    pub ordering: PatchOrdering,
}

impl Default for Resolver {
    fn default() -> Self {
        Resolver {
            guess: true,
            ordering: PatchOrdering::default(),
        }
    }
}

impl Resolver {
    pub fn new(guess: bool, ordering: PatchOrdering) -> Self {
        Resolver { guess, ordering }
    }

    /// Find the most appropriate pin for `reference` among `refs`.
    ///
    /// Returns a branch head sha, an `-eol` tag name, a synthesized version
    /// with the highest matching patch component, or `reference` itself when
    /// nothing matches. The listing order does not matter.
    pub fn resolve<'r, I>(&self, refs: I, reference: &str) -> String
    where
        I: IntoIterator<Item = &'r RemoteRef>,
    {
        let mut search: Vec<&str> = reference.split('.').collect();
        let eol_tag = eol_tag(reference);
        let mut best_patch: Option<&'r str> = None;
        let mut eol_seen = false;

        {
            let search_prefix = &search[..search.len() - 1];

            for remote in refs {
                match remote.kind {
                    RefKind::Branch if remote.name.as_str() == reference => {
                        log::debug!("`{}` is a branch with head {}", reference, remote.sha);
                        return remote.sha.to_string();
                    }
                    RefKind::Tag if eol_tag.as_deref() == Some(remote.name.as_str()) => {
                        // a live branch listed later still wins
                        eol_seen = true;
                    }
                    RefKind::Tag if self.guess => {
                        let tag: Vec<&'r str> = remote.name.split('.').collect();
                        if let Some((patch, tag_prefix)) = tag.split_last() {
                            // an empty prefix never matches, so `master` can't
                            // turn into `master.2`
                            if !tag_prefix.is_empty() && tag_prefix == search_prefix {
                                best_patch = Some(match best_patch {
                                    Some(best)
                                        if self.ordering.compare(best, patch)
                                            != Ordering::Less =>
                                    {
                                        best
                                    }
                                    _ => *patch,
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        if let Some(tag) = eol_tag.filter(|_| eol_seen) {
            log::debug!("`{}` reached end of life as `{}`", reference, tag);
            return tag;
        }

        match best_patch {
            Some(patch) => {
                search.pop();
                search.push(patch);
                let guessed = search.join(".");
                log::debug!("guessed `{}` for `{}`", guessed, reference);
                guessed
            }
            None => {
                log::debug!("nothing matches `{}` remotely, keeping it", reference);
                reference.to_string()
            }
        }
    }
}

/// `stable/pike` reached end of life as `pike-eol`.
pub fn eol_tag(reference: &str) -> Option<String> {
    reference
        .find(STABLE_PREFIX)
        .map(|idx| format!("{}{}", &reference[idx + STABLE_PREFIX.len()..], EOL_SUFFIX))
}

/// Resolve with the default (lexicographic) patch ordering.
pub fn resolve<'r, I>(refs: I, reference: &str, guess: bool) -> String
where
    I: IntoIterator<Item = &'r RemoteRef>,
{
    Resolver::new(guess, PatchOrdering::default()).resolve(refs, reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SHA_A: &str = "abcabcabcabcabcabcabcabcabcabcabcabcabc0";
    const SHA_B: &str = "0123456789012345678901234567890123456789";
    const SHA_C: &str = "ffffffffffffffffffffffffffffffffffffffff";

    fn tags(names: &[&str]) -> Vec<RemoteRef> {
        names.iter().map(|name| RemoteRef::tag(SHA_C, name)).collect()
    }

    #[test]
    fn branch_matches_exactly() {
        crate::test_helpers::logger();
        let mut refs = tags(&["pike-eol", "16.0.0", "16.0.1"]);
        refs.push(RemoteRef::branch(SHA_B, "master"));
        refs.push(RemoteRef::branch(SHA_A, "stable/pike"));

        assert_eq!(resolve(&refs, "stable/pike", true), SHA_A);
    }

    #[test]
    fn branch_wins_over_eol_tag_listed_first() {
        let mut refs = tags(&["pike-eol"]);
        refs.push(RemoteRef::branch(SHA_A, "stable/pike"));

        assert_eq!(resolve(&refs, "stable/pike", true), SHA_A);
    }

    #[test]
    fn retired_branch_resolves_to_eol_tag_name() {
        let mut refs = tags(&["13.3.18", "mitaka-eol", "newton-eol"]);
        refs.push(RemoteRef::branch(SHA_B, "master"));

        assert_eq!(resolve(&refs, "stable/mitaka", true), "mitaka-eol");
    }

    #[test]
    fn eol_tag_is_found_without_guessing() {
        let refs = tags(&["ocata-eol"]);
        assert_eq!(resolve(&refs, "stable/ocata", false), "ocata-eol");
    }

    #[test]
    fn guesses_patch_release_with_same_prefix() {
        let refs = tags(&["16.1.9", "16.1.10", "16.2.0"]);
        // "9" > "10" as strings
        assert_eq!(resolve(&refs, "16.1.9", true), "16.1.9");

        let refs = tags(&["16.1.10", "16.2.0", "17.0.0"]);
        assert_eq!(resolve(&refs, "16.1.9", true), "16.1.10");
    }

    #[test]
    fn numeric_ordering_guesses_highest_patch_release() {
        let refs = tags(&["16.1.9", "16.1.10", "16.2.0"]);
        let resolver = Resolver::new(true, PatchOrdering::Numeric);
        assert_eq!(resolver.resolve(&refs, "16.1.9"), "16.1.10");
    }

    #[test]
    fn branch_wins_over_eol_tag_in_any_order() {
        let eol = RemoteRef::tag(SHA_C, "pike-eol");
        let branch = RemoteRef::branch(SHA_A, "stable/pike");
        let guessable = RemoteRef::tag(SHA_C, "stable/pike.1");

        let listings = vec![
            vec![eol.clone(), branch.clone(), guessable.clone()],
            vec![guessable.clone(), eol.clone(), branch.clone()],
            vec![branch.clone(), guessable, eol],
        ];
        for refs in &listings {
            assert_eq!(resolve(refs, "stable/pike", true), SHA_A);
            assert_eq!(resolve(refs, "stable/pike", false), SHA_A);
        }
    }

    #[test]
    fn eol_tag_is_found_among_other_tags() {
        let refs = tags(&["stable/pike.2", "pike-eol", "stable/pike.9"]);
        assert_eq!(resolve(&refs, "stable/pike", true), "pike-eol");
    }

    #[test]
    fn lexicographic_ordering_picks_string_max() {
        let refs = tags(&["1.2.4", "1.2.9", "1.2.15"]);
        assert_eq!(resolve(&refs, "1.2.3", true), "1.2.9");
    }

    #[test]
    fn numeric_ordering_picks_highest_number() {
        let refs = tags(&["1.2.4", "1.2.9", "1.2.15"]);
        let resolver = Resolver::new(true, PatchOrdering::Numeric);
        assert_eq!(resolver.resolve(&refs, "1.2.3"), "1.2.15");
    }

    #[test]
    fn numeric_ordering_prefers_numbers_over_prereleases() {
        let refs = tags(&["1.2.0rc1", "1.2.3", "1.2.0b2"]);
        let resolver = Resolver::new(true, PatchOrdering::Numeric);
        assert_eq!(resolver.resolve(&refs, "1.2.0"), "1.2.3");
    }

    #[test]
    fn unknown_reference_is_returned_unchanged() {
        let mut refs = tags(&["1.0.0", "2.0.0"]);
        refs.push(RemoteRef::branch(SHA_A, "master"));
        assert_eq!(resolve(&refs, "feature/foo", true), "feature/foo");
    }

    #[test]
    fn guessing_can_be_disabled() {
        let refs = tags(&["16.1.9", "16.1.10", "16.2.0"]);
        assert_eq!(resolve(&refs, "16.1.9", false), "16.1.9");

        let refs = tags(&["16.1.10"]);
        assert_eq!(resolve(&refs, "16.1.9", false), "16.1.9");
    }

    #[test]
    fn single_component_reference_never_guesses() {
        let refs = tags(&["master.1", "master.2"]);
        assert_eq!(resolve(&refs, "master", true), "master");
    }

    #[test]
    fn prefix_length_must_match() {
        let refs = tags(&["16.1", "16.1.2.3", "v16.1.4"]);
        assert_eq!(resolve(&refs, "16.1.0", true), "16.1.0");
    }

    #[test]
    fn empty_listing_keeps_reference() {
        assert_eq!(resolve(&[], "16.1.9", true), "16.1.9");
        assert_eq!(resolve(&[], "stable/queens", true), "stable/queens");
    }

    #[test]
    fn eol_tag_uses_text_after_stable() {
        assert_eq!(eol_tag("stable/pike").as_deref(), Some("pike-eol"));
        assert_eq!(eol_tag("stable/mitaka").as_deref(), Some("mitaka-eol"));
        assert_eq!(eol_tag("master"), None);
    }

    #[test]
    fn parses_branch_and_release_tags() {
        let listing = format!(
            "{a}\trefs/heads/master\n\
             {b}\trefs/heads/stable/pike\n\
             {c}\trefs/tags/16.0.1\n\
             {c}\trefs/tags/1.11.1rc1\n\
             {c}\trefs/tags/mitaka-eol\n\
             {c}\trefs/tags/latest\n\
             {c}\trefs/changes/12/345/6\n\
             not a ref line\n",
            a = SHA_A,
            b = SHA_B,
            c = SHA_C
        );

        let refs = parse_listing(&listing);
        assert_eq!(
            refs,
            vec![
                RemoteRef::branch(SHA_A, "master"),
                RemoteRef::branch(SHA_B, "stable/pike"),
                RemoteRef::tag(SHA_C, "16.0.1"),
                RemoteRef::tag(SHA_C, "1.11.1rc1"),
                RemoteRef::tag(SHA_C, "mitaka-eol"),
            ]
        );
    }

    #[test]
    fn display_is_a_listing_line() {
        let line = format!("{}\trefs/tags/16.0.1", SHA_C);
        let parsed = RemoteRef::parse_line(&line).unwrap();
        assert_eq!(parsed.to_string(), line);
    }

    #[test]
    fn short_sha_is_rejected() {
        assert_eq!(RemoteRef::parse_line("abc123\trefs/heads/master"), None);
    }

    #[test]
    fn patch_ordering_from_str() {
        assert_eq!("numeric".parse(), Ok(PatchOrdering::Numeric));
        assert_eq!("lexicographic".parse(), Ok(PatchOrdering::Lexicographic));
        assert!("semver".parse::<PatchOrdering>().is_err());
    }

    proptest! {
        #[test]
        fn listing_order_does_not_matter(
            patches in prop::collection::vec(0u32..40, 1..8),
            ordering in prop_oneof![Just(PatchOrdering::Lexicographic), Just(PatchOrdering::Numeric)],
        ) {
            let refs: Vec<RemoteRef> = patches
                .iter()
                .map(|p| RemoteRef::tag(SHA_C, &format!("3.1.{}", p)))
                .collect();
            let mut reversed = refs.clone();
            reversed.reverse();

            let resolver = Resolver::new(true, ordering);
            prop_assert_eq!(
                resolver.resolve(&refs, "3.1.0"),
                resolver.resolve(&reversed, "3.1.0")
            );
        }

        #[test]
        fn guessed_version_keeps_prefix(
            reference in "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}",
            patches in prop::collection::vec("[0-9]{1,3}", 0..6),
        ) {
            let prefix = reference.rsplitn(2, '.').nth(1).unwrap().to_string();
            let refs: Vec<RemoteRef> = patches
                .iter()
                .map(|p| RemoteRef::tag(SHA_C, &format!("{}.{}", prefix, p)))
                .collect();

            let resolved = resolve(&refs, &reference, true);
            let want = format!("{}.", prefix);
            prop_assert!(resolved.starts_with(&want));
            if patches.is_empty() {
                prop_assert_eq!(resolved, reference);
            }
        }

        #[test]
        fn without_guessing_only_exact_matches_change_reference(
            reference in "[a-z]{1,8}(\\.[0-9]{1,2}){0,2}",
            names in prop::collection::vec("[a-z]{1,8}(\\.[0-9]{1,2}){0,2}", 0..6),
        ) {
            let refs: Vec<RemoteRef> = names.iter().map(|n| RemoteRef::tag(SHA_C, n)).collect();
            prop_assert_eq!(resolve(&refs, &reference, false), reference);
        }
    }
}
