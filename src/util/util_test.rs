use minidom::Element;

use super::*;
use crate::jingle::ns;

#[test]
fn test_parse_ice_candidate_host() {
    let candidate = parse_ice_candidate(
        "a=candidate:1 1 udp 2122260223 192.168.1.10 52101 typ host generation 0 network-id 1",
    )
    .expect("host candidate");

    assert_eq!(candidate.foundation, "1");
    assert_eq!(candidate.component, "1");
    assert_eq!(candidate.protocol, "udp");
    assert_eq!(candidate.priority, "2122260223");
    assert_eq!(candidate.ip, "192.168.1.10");
    assert_eq!(candidate.port, "52101");
    assert_eq!(candidate.typ, "host");
    assert_eq!(candidate.generation, "0");
    assert_eq!(candidate.network_id.as_deref(), Some("1"));
    assert_eq!(candidate.rel_addr, None);
    assert_eq!(candidate.id.len(), 10);
}

#[test]
fn test_parse_ice_candidate_srflx() {
    let candidate = parse_ice_candidate(
        "a=candidate:2 1 UDP 1686052607 1.2.3.4 52101 typ srflx raddr 192.168.1.10 rport 52101 generation 1",
    )
    .expect("srflx candidate");

    assert_eq!(candidate.protocol, "udp");
    assert_eq!(candidate.typ, "srflx");
    assert_eq!(candidate.rel_addr.as_deref(), Some("192.168.1.10"));
    assert_eq!(candidate.rel_port.as_deref(), Some("52101"));
    assert_eq!(candidate.generation, "1");
}

#[test]
fn test_parse_ice_candidate_tcp() {
    let candidate = parse_ice_candidate(
        "candidate:3 1 tcp 1518280447 192.168.1.10 9 typ host tcptype active",
    )
    .expect("bare prefix accepted");

    assert_eq!(candidate.tcptype.as_deref(), Some("active"));
    assert_eq!(candidate.generation, "0");
}

#[test]
fn test_parse_ice_candidate_malformed() {
    // no typ token in the right place
    assert_eq!(
        parse_ice_candidate("a=candidate:1 1 udp 2122260223 192.168.1.10 52101 host"),
        None
    );
    assert_eq!(parse_ice_candidate("a=candidate:1 1 udp"), None);
    assert_eq!(parse_ice_candidate("a=mid:audio"), None);
}

#[test]
fn test_candidate_from_jingle() {
    let host: Element = Element::builder("candidate", ns::JINGLE_ICE_UDP)
        .attr("foundation", "1")
        .attr("component", "1")
        .attr("protocol", "udp")
        .attr("priority", "2130706431")
        .attr("ip", "10.0.0.1")
        .attr("port", "5000")
        .attr("type", "host")
        .build();
    assert_eq!(
        candidate_from_jingle(&host).as_deref(),
        Some("a=candidate:1 1 udp 2130706431 10.0.0.1 5000 typ host generation 0\r\n")
    );

    let srflx: Element = Element::builder("candidate", ns::JINGLE_ICE_UDP)
        .attr("foundation", "2")
        .attr("component", "1")
        .attr("protocol", "udp")
        .attr("priority", "1686052607")
        .attr("ip", "1.2.3.4")
        .attr("port", "5001")
        .attr("type", "srflx")
        .attr("rel-addr", "10.0.0.1")
        .attr("rel-port", "5000")
        .attr("generation", "2")
        .build();
    assert_eq!(
        candidate_from_jingle(&srflx).as_deref(),
        Some("a=candidate:2 1 udp 1686052607 1.2.3.4 5001 typ srflx raddr 10.0.0.1 rport 5000 generation 2\r\n")
    );

    let tcp: Element = Element::builder("candidate", ns::JINGLE_ICE_UDP)
        .attr("foundation", "3")
        .attr("component", "1")
        .attr("protocol", "tcp")
        .attr("priority", "1518280447")
        .attr("ip", "10.0.0.1")
        .attr("port", "9")
        .attr("type", "host")
        .attr("tcptype", "active")
        .build();
    assert_eq!(
        candidate_from_jingle(&tcp).as_deref(),
        Some("a=candidate:3 1 tcp 1518280447 10.0.0.1 9 typ host tcptype active generation 0\r\n")
    );

    let incomplete: Element = Element::builder("candidate", ns::JINGLE_ICE_UDP)
        .attr("foundation", "1")
        .build();
    assert_eq!(candidate_from_jingle(&incomplete), None);
}

#[test]
fn test_parse_rtpmap() {
    let opus = parse_rtpmap("a=rtpmap:111 opus/48000/2").expect("opus");
    assert_eq!(opus.id, "111");
    assert_eq!(opus.name, "opus");
    assert_eq!(opus.clockrate, "48000");
    assert_eq!(opus.channels, "2");

    let vp8 = parse_rtpmap("a=rtpmap:100 VP8/90000").expect("vp8");
    assert_eq!(vp8.channels, "1");

    assert_eq!(parse_rtpmap("a=rtpmap:100"), None);
}

#[test]
fn test_build_rtpmap() {
    let stereo: Element = Element::builder("payload-type", ns::JINGLE_RTP)
        .attr("id", "111")
        .attr("name", "opus")
        .attr("clockrate", "48000")
        .attr("channels", "2")
        .build();
    assert_eq!(build_rtpmap(&stereo), "a=rtpmap:111 opus/48000/2");

    let mono: Element = Element::builder("payload-type", ns::JINGLE_RTP)
        .attr("id", "100")
        .attr("name", "VP8")
        .attr("clockrate", "90000")
        .attr("channels", "1")
        .build();
    assert_eq!(build_rtpmap(&mono), "a=rtpmap:100 VP8/90000");
}

#[test]
fn test_parse_fmtp() {
    let parameters = parse_fmtp("a=fmtp:111 minptime=10; useinbandfec=1").expect("fmtp");
    assert_eq!(parameters.len(), 2);
    assert_eq!(parameters[0].name, "minptime");
    assert_eq!(parameters[0].value.as_deref(), Some("10"));
    assert_eq!(parameters[1].name, "useinbandfec");
    assert_eq!(parameters[1].value.as_deref(), Some("1"));

    let apt = parse_fmtp("a=fmtp:96 apt=100").expect("apt");
    assert_eq!(apt[0].name, "apt");
    assert_eq!(apt[0].value.as_deref(), Some("100"));

    let bare = parse_fmtp("a=fmtp:126 annexb").expect("bare token");
    assert_eq!(bare[0].name, "annexb");
    assert_eq!(bare[0].value, None);

    assert_eq!(parse_fmtp("a=fmtp:111"), None);
}

#[test]
fn test_parse_rtcp_fb() {
    let nack_pli = parse_rtcp_fb("a=rtcp-fb:100 nack pli").expect("nack pli");
    assert_eq!(nack_pli.pt, "100");
    assert_eq!(nack_pli.typ, "nack");
    assert_eq!(nack_pli.params, vec!["pli".to_owned()]);

    let wildcard = parse_rtcp_fb("a=rtcp-fb:* transport-cc").expect("wildcard");
    assert_eq!(wildcard.pt, "*");
    assert!(wildcard.params.is_empty());

    assert_eq!(parse_rtcp_fb("a=rtcp-fb:100"), None);
}

#[test]
fn test_parse_fingerprint() {
    let fingerprint =
        parse_fingerprint("a=fingerprint:sha-256 AB:CD:EF:01:23:45").expect("fingerprint");
    assert_eq!(fingerprint.hash, "sha-256");
    assert_eq!(fingerprint.fingerprint, "AB:CD:EF:01:23:45");

    assert_eq!(parse_fingerprint("a=fingerprint:sha-256"), None);
}

#[test]
fn test_parse_extmap() {
    let audio_level =
        parse_extmap("a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level").expect("extmap");
    assert_eq!(audio_level.value, "1");
    assert_eq!(audio_level.direction, "both");
    assert_eq!(audio_level.uri, "urn:ietf:params:rtp-hdrext:ssrc-audio-level");

    let directed = parse_extmap("a=extmap:3/recvonly http://example.com/082005/ext.htm#ttime")
        .expect("directed extmap");
    assert_eq!(directed.value, "3");
    assert_eq!(directed.direction, "recvonly");

    assert_eq!(parse_extmap("a=extmap:3"), None);
}

#[test]
fn test_parse_crypto() {
    let crypto = parse_crypto(
        "a=crypto:1 AES_CM_128_HMAC_SHA1_80 inline:PS1uQCVeeCFCanVmcjkpPywjNWhcYD0mXXtxaVBR",
    )
    .expect("crypto");
    assert_eq!(crypto.tag, "1");
    assert_eq!(crypto.crypto_suite, "AES_CM_128_HMAC_SHA1_80");
    assert_eq!(crypto.session_params, None);

    let with_session = parse_crypto(
        "a=crypto:2 F8_128_HMAC_SHA1_80 inline:MTIzNDU2Nzg5QUJDREUwMTIzNDU2Nzg5QUJjZGVm 2^20 1:4",
    )
    .expect("crypto with session params");
    assert_eq!(with_session.session_params.as_deref(), Some("2^20 1:4"));

    assert_eq!(parse_crypto("a=crypto:1 AES_CM_128_HMAC_SHA1_80"), None);
}

#[test]
fn test_parse_sctpmap() {
    let sctpmap = parse_sctpmap("a=sctpmap:5000 webrtc-datachannel 1024").expect("sctpmap");
    assert_eq!(sctpmap.number, "5000");
    assert_eq!(sctpmap.protocol, "webrtc-datachannel");
    assert_eq!(sctpmap.streams.as_deref(), Some("1024"));

    let short = parse_sctpmap("a=sctpmap:5000 webrtc-datachannel").expect("no stream count");
    assert_eq!(short.streams, None);
}

#[test]
fn test_parse_mline() {
    let mline = parse_mline("m=video 9 UDP/TLS/RTP/SAVPF 100 96 97").expect("mline");
    assert_eq!(mline.media, "video");
    assert_eq!(mline.port, "9");
    assert_eq!(mline.proto, "UDP/TLS/RTP/SAVPF");
    assert_eq!(mline.formats, vec!["100", "96", "97"]);

    assert_eq!(build_mline(&mline), "m=video 9 UDP/TLS/RTP/SAVPF 100 96 97");
    assert_eq!(parse_mline("m=video 9"), None);
}

#[test]
fn test_find_line_session_fallback() {
    let media = "m=audio 9 RTP/SAVPF 111\r\na=mid:audio\r\n";
    let session = "v=0\r\na=ice-ufrag:fromsession\r\n";

    assert_eq!(
        find_line_in(media, "a=ice-ufrag:", Some(session)),
        Some("a=ice-ufrag:fromsession")
    );
    assert_eq!(find_line_in(media, "a=mid:", Some(session)), Some("a=mid:audio"));
    assert_eq!(find_line_in(media, "a=msid:", Some(session)), None);
}

#[test]
fn test_filter_special_chars() {
    assert_eq!(filter_special_chars("t\\e/s{t,v}a+lue"), "testvalue");
    assert_eq!(filter_special_chars("clean-value"), "clean-value");
}

#[test]
fn test_generate_ssrc() {
    for _ in 0..16 {
        assert_ne!(generate_ssrc(), 0);
    }
}

#[test]
fn test_parse_group_ssrcs() {
    let group = parse_group_ssrcs("a=ssrc-group:FID 1757014965 984899560").expect("group");
    assert_eq!(group.semantics, "FID");
    assert_eq!(group.ssrcs, vec![1757014965, 984899560]);

    // bad tokens are skipped, not fatal
    let partial = parse_group_ssrcs("a=ssrc-group:SIM 1 junk 3").expect("partial group");
    assert_eq!(partial.ssrcs, vec![1, 3]);
}

#[test]
fn test_get_ssrc_attribute() {
    let media = "m=audio 9 RTP/SAVPF 111\r\n\
                 a=ssrc:2002 cname:juejgy8a01\r\n\
                 a=ssrc:2002 msid:stream track\r\n";

    assert_eq!(
        get_ssrc_attribute(media, 2002, "cname").as_deref(),
        Some("juejgy8a01")
    );
    assert_eq!(
        get_ssrc_attribute(media, 2002, "msid").as_deref(),
        Some("stream track")
    );
    assert_eq!(get_ssrc_attribute(media, 2002, "label"), None);
    assert_eq!(get_ssrc_attribute(media, 9999, "cname"), None);
}

const SIMULCAST_MEDIA: &str = "m=video 9 UDP/TLS/RTP/SAVPF 100\r\n\
     a=ssrc:1111 cname:peer\r\n\
     a=ssrc:2222 cname:peer\r\n\
     a=ssrc:3333 cname:peer\r\n\
     a=ssrc-group:SIM 2222 1111 3333\r\n";

#[test]
fn test_parse_primary_video_ssrc() {
    let single = "m=video 9 UDP/TLS/RTP/SAVPF 100\r\na=ssrc:1234 cname:peer\r\n";
    assert_eq!(parse_primary_video_ssrc(single), Some(1234));

    let fid = "m=video 9 UDP/TLS/RTP/SAVPF 100\r\n\
               a=ssrc:984899560 cname:peer\r\n\
               a=ssrc:1757014965 cname:peer\r\n\
               a=ssrc-group:FID 1757014965 984899560\r\n";
    assert_eq!(parse_primary_video_ssrc(fid), Some(1757014965));

    assert_eq!(parse_primary_video_ssrc(SIMULCAST_MEDIA), Some(2222));

    // two ssrcs with no group is ambiguous, not an error
    let ambiguous = "m=video 9 UDP/TLS/RTP/SAVPF 100\r\n\
                     a=ssrc:1 cname:peer\r\n\
                     a=ssrc:2 cname:peer\r\n";
    assert_eq!(parse_primary_video_ssrc(ambiguous), None);

    let empty = "m=video 9 UDP/TLS/RTP/SAVPF 100\r\n";
    assert_eq!(parse_primary_video_ssrc(empty), None);
}

const H264_MEDIA: &str = "m=video 9 UDP/TLS/RTP/SAVPF 96 97 102 127\r\n\
     a=rtpmap:96 VP8/90000\r\n\
     a=rtpmap:97 rtx/90000\r\n\
     a=fmtp:97 apt=96\r\n\
     a=rtpmap:102 H264/90000\r\n\
     a=fmtp:102 packetization-mode=1;profile-level-id=42001f\r\n\
     a=rtpmap:127 H264/90000\r\n\
     a=fmtp:127 packetization-mode=0;profile-level-id=42001f\r\n";

#[test]
fn test_prefer_codec() {
    let preferred = prefer_codec(H264_MEDIA, "H264", false);
    assert!(preferred.starts_with("m=video 9 UDP/TLS/RTP/SAVPF 102 127 96 97\r\n"));
    // everything below the m-line is untouched
    assert_eq!(
        preferred.split_once("\r\n").map(|(_, rest)| rest),
        H264_MEDIA.split_once("\r\n").map(|(_, rest)| rest)
    );

    // codec name matching is case-insensitive
    let lowercase = prefer_codec(H264_MEDIA, "h264", false);
    assert!(lowercase.starts_with("m=video 9 UDP/TLS/RTP/SAVPF 102 127 96 97\r\n"));

    // no matches leaves the section alone
    assert_eq!(prefer_codec(H264_MEDIA, "AV1", false), H264_MEDIA);
}

#[test]
fn test_prefer_codec_packetization_mode() {
    let preferred = prefer_codec(H264_MEDIA, "H264", true);
    assert!(preferred.starts_with("m=video 9 UDP/TLS/RTP/SAVPF 127 102 96 97\r\n"));
}

#[test]
fn test_strip_codec_with_rtx() {
    let media = "m=video 9 UDP/TLS/RTP/SAVPF 96 97 98 99\r\n\
                 a=rtpmap:96 VP8/90000\r\n\
                 a=rtpmap:97 rtx/90000\r\n\
                 a=fmtp:97 apt=96\r\n\
                 a=rtpmap:98 VP9/90000\r\n\
                 a=rtcp-fb:98 nack pli\r\n\
                 a=rtpmap:99 rtx/90000\r\n\
                 a=fmtp:99 apt=98\r\n";

    let stripped = strip_codec(media, "VP9", false);
    assert!(stripped.starts_with("m=video 9 UDP/TLS/RTP/SAVPF 96 97\r\n"));
    assert!(!stripped.contains("a=rtpmap:98"));
    assert!(!stripped.contains("a=rtcp-fb:98"));
    assert!(!stripped.contains("a=rtpmap:99"));
    assert!(!stripped.contains("a=fmtp:99"));
    assert!(stripped.contains("a=rtpmap:96 VP8/90000"));
    assert!(stripped.contains("a=fmtp:97 apt=96"));
}

#[test]
fn test_strip_codec_high_profile_only() {
    let media = "m=video 9 UDP/TLS/RTP/SAVPF 98 100\r\n\
                 a=rtpmap:98 VP9/90000\r\n\
                 a=fmtp:98 profile-id=0\r\n\
                 a=rtpmap:100 VP9/90000\r\n\
                 a=fmtp:100 profile-id=2\r\n";

    let stripped = strip_codec(media, "VP9", true);
    assert!(stripped.starts_with("m=video 9 UDP/TLS/RTP/SAVPF 98\r\n"));
    assert!(stripped.contains("a=fmtp:98 profile-id=0"));
    assert!(!stripped.contains("a=rtpmap:100"));
}

#[test]
fn test_strip_codec_to_empty() {
    let media = "m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
                 a=sendrecv\r\n\
                 a=rtpmap:111 opus/48000/2\r\n\
                 a=fmtp:111 minptime=10\r\n";

    let stripped = strip_codec(media, "opus", false);
    assert!(stripped.starts_with("m=audio 0 UDP/TLS/RTP/SAVPF *\r\n"));
    assert!(stripped.contains("a=inactive"));
    assert!(!stripped.contains("a=sendrecv"));
    assert!(!stripped.contains("a=rtpmap:111"));
}
