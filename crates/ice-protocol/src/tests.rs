//! Codec and envelope tests.

use std::io::Cursor;

use rstest::{fixture, rstest};
use serde_json::json;

use crate::{
    ClazzCheck, CodecError, Context, Envelope, FrameReader, FrameWriter, MessageKind, NodeConf,
    NodeType, Op, Pack, Payload, ShowConf, ShowNode, TimeType, TransferDto,
};

fn leaf(node_id: i64, debug: Option<bool>, inverse: Option<bool>) -> ShowNode {
    ShowNode {
        show_conf: NodeConf {
            node_id,
            debug,
            inverse,
        },
        time_type: TimeType::None.as_byte(),
        start: None,
        end: None,
        children: None,
        forward: None,
    }
}

#[fixture]
fn show_conf() -> ShowConf {
    let mut root = leaf(1, Some(false), None);
    root.children = Some(vec![
        ShowNode {
            end: Some(5),
            ..leaf(2, None, None)
        },
        leaf(3, Some(false), Some(true)),
    ]);
    root.forward = Some(Box::new(leaf(4, Some(false), None)));
    ShowConf {
        address: "10.0.0.7/app-1".to_owned(),
        conf_id: 42,
        root: Some(root),
    }
}

fn encode_all(envelopes: &[Envelope]) -> Vec<u8> {
    let mut writer = FrameWriter::new(Vec::new());
    for envelope in envelopes {
        writer.write_envelope(envelope).expect("write envelope");
    }
    writer.into_inner()
}

fn decode_all(bytes: &[u8]) -> Vec<Envelope> {
    let mut reader = FrameReader::new(Cursor::new(bytes));
    let mut out = Vec::new();
    while let Some(envelope) = reader.read_envelope().expect("read envelope") {
        out.push(envelope);
    }
    out
}

#[rstest]
fn request_constructor_derives_op_and_kind() {
    let envelope = Envelope::request(7, Payload::ShowConf { conf_id: 9 }).with_id("abc");
    assert_eq!(envelope.op, Op::ShowConf);
    assert_eq!(envelope.kind, MessageKind::Req);
    assert_eq!(envelope.id(), Some("abc"));
    envelope.validate().expect("valid request");
}

#[rstest]
fn response_copies_id_and_app() {
    let request = Envelope::request(3, Payload::Mock(Pack::default())).with_id("req-1");
    let response = Envelope::response_to(&request, Payload::MockResult(Vec::new()));
    assert_eq!(response.id(), Some("req-1"));
    assert_eq!(response.app, 3);
    assert_eq!(response.kind, MessageKind::Rsp);
    assert_eq!(response.op, Op::Mock);
}

#[rstest]
fn display_tree_survives_the_codec(show_conf: ShowConf) {
    let request = Envelope::request(1, Payload::ShowConf { conf_id: 42 }).with_id("x");
    let response = Envelope::response_to(&request, Payload::ShowConfResult(Some(show_conf)));

    let decoded = decode_all(&encode_all(std::slice::from_ref(&response)));

    assert_eq!(decoded, vec![response]);
}

#[rstest]
fn display_tree_omits_absent_fields(show_conf: ShowConf) {
    let value = serde_json::to_value(&show_conf).expect("serialize");
    let first_child = &value["root"]["children"][0];
    assert_eq!(first_child["show_conf"], json!({ "node_id": 2 }));
    assert_eq!(first_child["end"], json!(5));
    assert!(first_child.get("start").is_none());
    assert!(first_child.get("children").is_none());
    assert_eq!(
        value["root"]["children"][1]["show_conf"],
        json!({ "node_id": 3, "debug": false, "inverse": true })
    );
}

#[rstest]
fn wire_shape_uses_protocol_names() {
    let envelope = Envelope::request(
        5,
        Payload::ClazzCheck {
            clazz: "com.example.ScoreLeaf".to_owned(),
            node_type: NodeType::LeafFlow.as_byte(),
        },
    )
    .with_id("id-1");
    let value = serde_json::to_value(&envelope).expect("serialize");
    assert_eq!(value["type"], json!("REQ"));
    assert_eq!(value["op"], json!("CLAZZ_CHECK"));
    assert_eq!(value["app"], json!(5));
    assert_eq!(
        value["payload"],
        json!({ "clazz_check": { "clazz": "com.example.ScoreLeaf", "node_type": 5 } })
    );
}

#[rstest]
fn fire_and_forget_update_has_no_id() {
    let envelope = Envelope::request(
        2,
        Payload::Update(TransferDto {
            version: 11,
            delete_conf_ids: vec![4],
            ..TransferDto::default()
        }),
    );
    envelope.validate().expect("updates need no id");
    let value = serde_json::to_value(&envelope).expect("serialize");
    assert!(value.get("id").is_none());
}

#[rstest]
fn reader_decodes_consecutive_frames_and_skips_blank_lines() {
    let first = Envelope::request(
        1,
        Payload::Init {
            address: "a".to_owned(),
        },
    );
    let second = Envelope::request(
        1,
        Payload::Slap {
            address: "a".to_owned(),
        },
    );
    let mut bytes = encode_all(std::slice::from_ref(&first));
    bytes.extend_from_slice(b"\n   \n");
    bytes.extend_from_slice(&encode_all(std::slice::from_ref(&second)));

    assert_eq!(decode_all(&bytes), vec![first, second]);
}

#[rstest]
fn reader_accepts_final_frame_without_newline() {
    let envelope = Envelope::request(
        1,
        Payload::Init {
            address: "a".to_owned(),
        },
    );
    let mut bytes = encode_all(std::slice::from_ref(&envelope));
    bytes.pop();
    assert_eq!(decode_all(&bytes), vec![envelope]);
}

#[rstest]
fn reader_rejects_oversized_frames() {
    let bytes = vec![b'x'; 64];
    let mut reader = FrameReader::with_limit(Cursor::new(bytes), 16);
    let error = reader.read_envelope().expect_err("frame should be rejected");
    assert!(matches!(
        error,
        CodecError::FrameTooLarge { max_size: 16, .. }
    ));
    assert!(!error.is_recoverable());
}

#[rstest]
fn reader_rejects_malformed_json() {
    let mut reader = FrameReader::new(Cursor::new(b"not json\n".to_vec()));
    let error = reader.read_envelope().expect_err("garbage should fail");
    assert!(matches!(error, CodecError::MalformedJson { .. }));
    assert!(error.is_recoverable());
}

#[rstest]
#[case::op_mismatch(json!({
    "id": "a", "app": 1, "type": "REQ", "op": "MOCK",
    "payload": { "show_conf": { "conf_id": 1 } }
}))]
#[case::kind_mismatch(json!({
    "id": "a", "app": 1, "type": "REQ", "op": "MOCK",
    "payload": { "mock_result": [] }
}))]
#[case::missing_id(json!({
    "app": 1, "type": "REQ", "op": "SHOW_CONF",
    "payload": { "show_conf": { "conf_id": 1 } }
}))]
#[case::blank_response_id(json!({
    "id": " ", "app": 1, "type": "RSP", "op": "CLAZZ_CHECK",
    "payload": { "clazz_check_result": { "code": 1 } }
}))]
fn reader_rejects_inconsistent_envelopes(#[case] frame: serde_json::Value) {
    let mut bytes = serde_json::to_vec(&frame).expect("serialize frame");
    bytes.push(b'\n');
    let mut reader = FrameReader::new(Cursor::new(bytes));
    let error = reader.read_envelope().expect_err("frame should be invalid");
    assert!(matches!(error, CodecError::InvalidStructure { .. }));
}

#[rstest]
fn mock_result_keeps_context_order() {
    let contexts = vec![
        Context {
            ice_id: 1,
            process_info: "[1:R-T]".to_owned(),
            ..Context::default()
        },
        Context {
            ice_id: 2,
            ..Context::default()
        },
    ];
    let request = Envelope::request(1, Payload::Mock(Pack::default())).with_id("m");
    let response = Envelope::response_to(&request, Payload::MockResult(contexts.clone()));
    let decoded = decode_all(&encode_all(&[response]));
    let [only] = decoded.as_slice() else {
        panic!("expected one envelope, got {decoded:?}");
    };
    assert_eq!(only.payload, Payload::MockResult(contexts));
}

#[rstest]
fn clazz_check_helpers() {
    assert!(ClazzCheck::passed().is_ok());
    let failed = ClazzCheck::failed("nope");
    assert!(!failed.is_ok());
    assert_eq!(failed.message.as_deref(), Some("nope"));
}

#[rstest]
fn node_type_tags_round_trip() {
    for node_type in NodeType::ALL {
        assert_eq!(NodeType::from_byte(node_type.as_byte()), Ok(node_type));
    }
    assert!(NodeType::from_byte(8).is_err());
}

#[rstest]
#[case(TimeType::None, 1)]
#[case(TimeType::AfterStart, 5)]
#[case(TimeType::BeforeEnd, 6)]
#[case(TimeType::Between, 7)]
fn time_type_tags(#[case] time_type: TimeType, #[case] tag: u8) {
    assert_eq!(time_type.as_byte(), tag);
    assert_eq!(TimeType::from_byte(tag), Ok(time_type));
}
