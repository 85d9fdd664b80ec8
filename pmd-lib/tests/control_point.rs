//! Tests for control point responses, measurement status and offline triggers

mod common;

use common::*;
use pmd_lib::control_point::{
    PmdActiveMeasurement, PmdControlPointCommand, PmdControlPointResponse, PmdOfflineTrigger, PmdOfflineTriggerMode,
    PmdOfflineTriggerStatus, PmdResponseStatus, get_measurement_settings, get_measurement_status,
    get_offline_trigger_status, set_offline_trigger_mode, set_offline_trigger_settings, stop_measurement,
};

#[test]
fn test_settings_response_with_more_flag() {
    let mut bytes = hex_to_bytes("F0 01 02 00 01").to_vec();
    bytes.extend_from_slice(&hex_to_bytes(ACC_SETTINGS_VECTOR));
    let response = PmdControlPointResponse::from_bytes(&bytes).expect("Failed to parse response");

    assert_eq!(response.response_code, 0xF0);
    assert_eq!(response.op_code, PmdControlPointCommand::GetMeasurementSettings);
    assert_eq!(response.measurement_type, PmdMeasurementType::Acc);
    assert_eq!(response.status, PmdResponseStatus::Success);
    assert!(response.more);
    assert_eq!(response.parameters, hex_to_bytes(ACC_SETTINGS_VECTOR).to_vec());

    let setting = response.into_result().unwrap().setting().unwrap();
    assert_eq!(setting.channels(), Some(3));
}

#[test]
fn test_error_status_surfaces() {
    let response = PmdControlPointResponse::from_bytes(&hex_to_bytes("F0 02 00 0D 00")).unwrap();
    assert_eq!(response.status, PmdResponseStatus::DeviceInCharger);
    match response.into_result() {
        Err(PmdError::ControlPointResponse(msg)) => {
            assert!(msg.contains("ERROR_DEVICE_IN_CHARGER"), "unexpected message: {msg}");
        }
        other => panic!("Expected ControlPointResponse error, got: {other:?}"),
    }
}

#[test]
fn test_measurement_status_response() {
    let response = PmdControlPointResponse::from_bytes(&hex_to_bytes("F0 05 00 00 00 C3")).unwrap();
    assert_eq!(response.op_code, PmdControlPointCommand::GetMeasurementStatus);
    assert_eq!(
        PmdActiveMeasurement::from_status_response_params(&response.parameters).unwrap(),
        PmdActiveMeasurement::OnlineAndOfflineActive
    );
}

#[test]
fn test_offline_trigger_status() {
    // system start; ACC enabled at 52 Hz; PPI disabled; GYRO enabled without settings
    let params = hex_to_bytes("01 01 02 04 00 01 34 00 00 03 01 05 00");
    let trigger = PmdOfflineTrigger::parse_from_response(&params).expect("Failed to parse trigger status");

    assert_eq!(trigger.mode, PmdOfflineTriggerMode::SystemStart);
    let order: Vec<PmdMeasurementType> = trigger.triggers.iter().map(|t| t.measurement_type).collect();
    assert_eq!(
        order,
        vec![PmdMeasurementType::Acc, PmdMeasurementType::Ppi, PmdMeasurementType::Gyro]
    );

    let acc = trigger.get(PmdMeasurementType::Acc).unwrap();
    assert_eq!(acc.status, PmdOfflineTriggerStatus::Enabled);
    assert_eq!(acc.setting.as_ref().and_then(PmdSetting::sample_rate), Some(52));

    let ppi = trigger.get(PmdMeasurementType::Ppi).unwrap();
    assert_eq!(ppi.status, PmdOfflineTriggerStatus::Disabled);
    assert!(ppi.setting.is_none());

    let gyro = trigger.get(PmdMeasurementType::Gyro).unwrap();
    assert_eq!(gyro.status, PmdOfflineTriggerStatus::Enabled);
    assert!(gyro.setting.is_none());

    assert!(trigger.get(PmdMeasurementType::Ecg).is_none());
}

#[test]
fn test_offline_trigger_with_aes_secret() {
    let aes = PmdSecret::new(SecretStrategy::Aes128, [0x22u8; 16]).unwrap();
    let setting = PmdSetting::from_selected([(PmdSettingType::SampleRate, 52)].into_iter().collect());
    let request = set_offline_trigger_settings(
        PmdMeasurementType::Acc,
        PmdOfflineTriggerStatus::Enabled,
        Some(&setting),
        Some(&aes),
    )
    .unwrap();

    // status response echoes the group after the trigger mode, followed by a disabled PPI
    let mut params: Vec<u8> = vec![PmdOfflineTriggerMode::SystemStart.into()];
    params.extend_from_slice(&request[1..]);
    params.extend_from_slice(&[0x00, 0x03]);

    let trigger = PmdOfflineTrigger::parse_from_response(&params).expect("Failed to parse trigger status");
    assert_eq!(trigger.triggers.len(), 2);
    let acc = trigger.get(PmdMeasurementType::Acc).unwrap();
    let acc_setting = acc.setting.as_ref().unwrap();
    assert_eq!(acc_setting.sample_rate(), Some(52));
    assert_eq!(acc_setting.secret.as_ref(), Some(&aes));
    assert_eq!(
        trigger.get(PmdMeasurementType::Ppi).map(|t| t.status),
        Some(PmdOfflineTriggerStatus::Disabled)
    );
}

#[test]
fn test_offline_trigger_errors() {
    let cases = [
        ("", "empty"),
        ("07", "unknown mode"),
        ("00 02 02", "unknown status"),
        ("00 01", "half group"),
        ("00 01 02", "missing settings length"),
        ("00 01 02 04 00 01", "short settings"),
    ];
    for (params, description) in cases {
        let result = PmdOfflineTrigger::parse_from_response(&hex_to_bytes(params));
        assert!(
            matches!(result, Err(PmdError::ControlPointResponse(_))),
            "{description}: expected ControlPointResponse error, got {result:?}"
        );
    }
}

#[test]
fn test_simple_requests() {
    assert_eq!(get_measurement_settings(PmdMeasurementType::Ecg), vec![0x01, 0x00]);
    assert_eq!(stop_measurement(PmdMeasurementType::Ppg), vec![0x03, 0x01]);
    assert_eq!(get_measurement_status(), vec![0x05]);
    assert_eq!(get_offline_trigger_status(), vec![0x07]);
    assert_eq!(set_offline_trigger_mode(PmdOfflineTriggerMode::ExerciseStart), vec![0x08, 0x02]);
}
