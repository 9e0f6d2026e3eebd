//! Malformed and unusual display lists

use gxshim_runtime::graphics::gx::state::{VtxAttr, VtxInputType};
use gxshim_runtime::{Anomaly, GxProcessor, RecordingBackend, ReplayFault};

fn processor() -> GxProcessor<RecordingBackend> {
    GxProcessor::new(RecordingBackend::new())
}

#[test]
fn test_empty_list() {
    let mut gx = processor();
    let report = gx.call_display_list(&[]);
    assert!(report.is_complete());
    assert_eq!(report.commands, 0);
    assert_eq!(report.bytes_consumed, 0);
}

#[test]
fn test_nop_padding_is_consumed() {
    let mut gx = processor();
    let report = gx.call_display_list(&[0; 32]);
    assert!(report.is_complete());
    assert_eq!(report.commands, 32);
}

#[test]
fn test_unknown_opcode_keeps_earlier_writes() {
    let mut gx = processor();
    let list = [0x08, 0x50, 0, 0, 0x02, 0x00, 0x00, 0x13];
    let report = gx.call_display_list(&list);
    // The CP write and the NOP land; 0x13 is not an opcode.
    assert_eq!(
        report.fault,
        Some(ReplayFault::UnknownOpcode {
            offset: 7,
            opcode: 0x13
        })
    );
    assert_eq!(gx.state().vtx_desc(VtxAttr::Position), VtxInputType::Direct);
    assert_eq!(report.fault.as_ref().map(ReplayFault::offset), Some(7));
}

#[test]
fn test_truncated_xf_payload() {
    let mut gx = processor();
    // Four words announced, one present.
    let list = [0x10, 0x00, 0x03, 0x00, 0x00, 0x3F, 0x80, 0x00, 0x00];
    let report = gx.call_display_list(&list);
    assert_eq!(
        report.fault,
        Some(ReplayFault::Truncated {
            offset: 0,
            needed: 16,
            available: 4
        })
    );
    // Nothing of the partial load is applied.
    assert_eq!(gx.state().matrices.position[0][0], 1.0);
}

#[test]
fn test_opcode_at_end_without_operands() {
    let mut gx = processor();
    let report = gx.call_display_list(&[0x00, 0x61]);
    assert!(matches!(
        report.fault,
        Some(ReplayFault::Truncated { offset: 1, .. })
    ));
    assert_eq!(report.commands, 1);
}

#[test]
fn test_nested_call_is_not_followed() {
    let mut gx = processor();
    let mut list = vec![0x40];
    list.extend_from_slice(&0x8040_0000u32.to_be_bytes());
    list.extend_from_slice(&0x20u32.to_be_bytes());
    list.push(0x00);
    let report = gx.call_display_list(&list);
    assert!(report.is_complete());
    assert_eq!(report.commands, 2);
    assert!(matches!(
        report.anomalies[..],
        [Anomaly::NestedCall {
            address: 0x8040_0000,
            size: 0x20,
            ..
        }]
    ));
    assert_eq!(gx.telemetry().unimplemented().get("nested display list"), Some(&1));
}

#[test]
fn test_unresolved_texture_token_is_reported() {
    let mut gx = processor();
    let list = [0x61, 0x94, 0x00, 0x12, 0x34];
    let report = gx.call_display_list(&list);
    assert!(report.is_complete());
    assert_eq!(
        report.anomalies,
        vec![Anomaly::UnresolvedTexture {
            offset: 0,
            map: 0,
            token: 0x1234
        }]
    );
}

#[test]
fn test_garbage_never_panics() {
    // A deterministic byte soup covering every opcode class.
    let mut seed = 0x1234_5678u32;
    let list: Vec<u8> = (0..4096)
        .map(|_| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed as u8
        })
        .collect();
    let mut gx = processor();
    let report = gx.call_display_list(&list);
    assert!(report.bytes_consumed <= list.len());
}
