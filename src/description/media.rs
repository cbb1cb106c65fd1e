use std::fmt;

/// MediaType is the kind of an `m=` section.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MediaType {
    Audio,
    Video,
    Application,
}

impl MediaType {
    pub fn new(raw: &str) -> Option<Self> {
        match raw {
            "audio" => Some(MediaType::Audio),
            "video" => Some(MediaType::Video),
            "application" => Some(MediaType::Application),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaType::Audio => "audio",
            MediaType::Video => "video",
            MediaType::Application => "application",
        };
        write!(f, "{s}")
    }
}

/// Direction is the transmission direction of a media section.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    /// The Jingle `senders` value this direction maps to.
    pub fn as_senders(&self) -> &'static str {
        match self {
            Direction::SendRecv => "both",
            Direction::SendOnly => "initiator",
            Direction::RecvOnly => "responder",
            Direction::Inactive => "none",
        }
    }

    /// The direction a Jingle `senders` value maps back to.
    pub fn from_senders(senders: &str) -> Option<Self> {
        match senders {
            "both" => Some(Direction::SendRecv),
            "initiator" => Some(Direction::SendOnly),
            "responder" => Some(Direction::RecvOnly),
            "none" => Some(Direction::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::SendRecv => "sendrecv",
            Direction::SendOnly => "sendonly",
            Direction::RecvOnly => "recvonly",
            Direction::Inactive => "inactive",
        };
        write!(f, "{s}")
    }
}

/// One SSRC of a media section together with its raw `a=ssrc:` lines, in
/// the order they appeared.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SsrcInfo {
    pub ssrc: u32,
    pub lines: Vec<String>,
}

impl SsrcInfo {
    fn attribute(&self, name: &str) -> Option<&str> {
        let needle = format!(" {name}:");
        self.lines
            .iter()
            .find_map(|line| line.find(&needle).map(|idx| &line[idx + needle.len()..]))
    }

    /// Value of the `name:` attribute, the signaled source name.
    pub fn source_name(&self) -> Option<&str> {
        self.attribute("name")
    }

    /// Value of the `videoType:` attribute.
    pub fn video_type(&self) -> Option<&str> {
        self.attribute("videoType")
    }

    /// Value of the `msid:` attribute.
    pub fn msid(&self) -> Option<&str> {
        self.attribute("msid")
    }
}

/// An `a=ssrc-group:` association.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SsrcGroup {
    /// `FID`, `SIM`, or any other semantics passed through opaquely.
    pub semantics: String,
    pub ssrcs: Vec<u32>,
}

/// Sources and source groups of one media section.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MediaSourceInfo {
    pub media_index: usize,
    /// The section's mid, or its index when no `a=mid:` line is present.
    pub mid: String,
    /// Sources ordered by first appearance of each SSRC.
    pub sources: Vec<SsrcInfo>,
    pub source_groups: Vec<SsrcGroup>,
}

impl MediaSourceInfo {
    pub fn has_ssrc(&self, ssrc: u32) -> bool {
        self.sources.iter().any(|s| s.ssrc == ssrc)
    }

    /// SSRC emission order for Jingle: group members first, in group and
    /// member order, then the remaining sources by first appearance. This
    /// keeps an FID pair's primary ahead of its RTX no matter how the
    /// `a=ssrc:` lines were ordered in the input.
    pub fn ordered_ssrcs(&self) -> Vec<u32> {
        let mut ordered: Vec<u32> = vec![];
        for group in &self.source_groups {
            for &ssrc in &group.ssrcs {
                if self.has_ssrc(ssrc) && !ordered.contains(&ssrc) {
                    ordered.push(ssrc);
                }
            }
        }
        for source in &self.sources {
            if !ordered.contains(&source.ssrc) {
                ordered.push(source.ssrc);
            }
        }
        ordered
    }
}
