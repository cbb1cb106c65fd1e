
use std::collections::{BTreeMap, HashSet};

use minidom::Element;

use crate::description::media::MediaSourceInfo;
use crate::description::session::SessionDescription;
use crate::jingle::ns;

/// Compares two session description snapshots and reports the sources one
/// carries that the other does not.
///
/// `SdpDiffer::new(old, new)` feeds a `source-add` when renegotiating from
/// `old` to `new`; the reversed pair feeds the matching `source-remove`.
/// Comparisons never mutate their inputs.
pub struct SdpDiffer<'a> {
    from: &'a SessionDescription,
    to: &'a SessionDescription,
}

impl<'a> SdpDiffer<'a> {
    /// Both snapshots are required up front; there is no meaningful diff
    /// against a missing description, so the type makes one impossible.
    pub fn new(from: &'a SessionDescription, to: &'a SessionDescription) -> Self {
        SdpDiffer { from, to }
    }

    /// Media sections of `to` whose SSRC key set differs from `from`'s,
    /// reported whole. A renegotiation replaces a section's encoding
    /// layout atomically, so the comparison is per section, not per SSRC,
    /// and insertion order does not matter.
    pub fn added_sources(&self) -> BTreeMap<usize, MediaSourceInfo> {
        let from_map = self.from.get_media_ssrc_map();
        let to_map = self.to.get_media_ssrc_map();

        let mut new_media = BTreeMap::new();
        for (index, to_info) in to_map {
            let Some(from_info) = from_map.get(&index) else {
                new_media.insert(index, to_info);
                continue;
            };

            let from_ssrcs: HashSet<u32> = from_info.sources.iter().map(|s| s.ssrc).collect();
            let to_ssrcs: HashSet<u32> = to_info.sources.iter().map(|s| s.ssrc).collect();
            if from_ssrcs != to_ssrcs {
                new_media.insert(index, to_info);
            }
        }
        new_media
    }

    /// Emits one `content`/`description` pair per changed media section
    /// into `jingle`. Returns whether anything was emitted; an empty diff
    /// must not be signaled at all.
    pub fn to_jingle(&self, jingle: &mut Element) -> bool {
        let mut modified = false;

        for (_, media) in self.added_sources() {
            modified = true;

            let mut description = Element::builder("description", ns::JINGLE_RTP)
                .attr("media", media.mid.as_str())
                .build();

            for source_info in &media.sources {
                let mut source = Element::builder("source", ns::JINGLE_SSMA)
                    .attr("ssrc", source_info.ssrc.to_string())
                    .build();
                if self.to.source_name_signaling {
                    if let Some(name) = source_info.source_name() {
                        source.set_attr("name", name);
                    }
                    if let Some(video_type) = source_info.video_type() {
                        source.set_attr("videoType", video_type);
                    }
                }
                for line in &source_info.lines {
                    let Some(idx) = line.find(' ') else {
                        continue;
                    };
                    if let Some(msid) = line[idx + 1..].strip_prefix("msid:") {
                        source.append_child(
                            Element::builder("parameter", ns::JINGLE_SSMA)
                                .attr("name", "msid")
                                .attr("value", msid)
                                .build(),
                        );
                    }
                }
                description.append_child(source);
            }

            for group in &media.source_groups {
                if group.ssrcs.is_empty() {
                    continue;
                }
                let mut group_el = Element::builder("ssrc-group", ns::JINGLE_SSMA)
                    .attr("semantics", group.semantics.as_str())
                    .build();
                for ssrc in &group.ssrcs {
                    group_el.append_child(
                        Element::builder("source", ns::JINGLE_SSMA)
                            .attr("ssrc", ssrc.to_string())
                            .build(),
                    );
                }
                description.append_child(group_el);
            }

            let mut content = Element::builder("content", ns::JINGLE)
                .attr("name", media.mid.as_str())
                .build();
            content.append_child(description);
            jingle.append_child(content);
        }

        modified
    }
}
