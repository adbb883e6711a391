//! Data report assembly
//!
//! Lays out one periodic input report for the current reporting mode:
//! preamble and report ID, core buttons, then accelerometer, IR and
//! extension fields at the offsets the mode defines.

use log::trace;

use crate::wiimote::constants::INPUT_REPORT_PREAMBLE;
use crate::wiimote::registers::RegisterFile;
use crate::wiimote::sensors::SensorSimulator;
use crate::wiimote::types::{IrPointer, ReportingMode};

/// Build the data report for `mode`.
///
/// `buttons` is the packed core button word. The sensor simulator is
/// advanced (IR roll filter) only when the mode carries IR data and the
/// camera is enabled.
pub fn build_data_report(
    mode: ReportingMode,
    buttons: u16,
    sensors: &mut SensorSimulator,
    pointer: &IrPointer,
    registers: &RegisterFile,
) -> Vec<u8> {
    let layout = mode.layout();
    let mut packet = vec![0u8; layout.size];

    packet[0] = INPUT_REPORT_PREAMBLE;
    packet[1] = mode.id();

    let core = layout.core;
    packet[core..core + 2].copy_from_slice(&buttons.to_le_bytes());

    if layout.has_accel() {
        let (head, tail) = packet.split_at_mut(layout.accel);
        sensors.encode_accel(&mut head[core..core + 2], &mut tail[..3]);
    }

    if layout.has_ir() && registers.ir_enabled() {
        let dots = sensors.project_ir(pointer, layout.has_accel());
        let field = &mut packet[layout.ir..layout.ir + layout.ir_len()];
        if !SensorSimulator::encode_ir(&dots, registers.ir_mode(), field) {
            trace!("IR field of report 0x{:02X} left empty", mode.id());
        }
    }

    // No extension is ever attached, so the extension field stays zeroed
    if layout.has_ext() {
        packet[layout.ext..].fill(0);
    }

    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiimote::constants::*;
    use crate::wiimote::registers::Region;
    use crate::wiimote::sensors::IR_EXTENDED_LEN;
    use crate::wiimote::types::{Accelerometer, ControllerInput, BUTTON_A};

    fn ir_ready(mode: u8) -> RegisterFile {
        let mut registers = RegisterFile::new();
        registers.write(Region::Ir, IR_ENABLE_OFFSET, &[0x08]).unwrap();
        registers.write(Region::Ir, IR_MODE_OFFSET, &[mode]).unwrap();
        registers
    }

    #[test]
    fn test_report_lengths() {
        let registers = RegisterFile::new();
        let mut sensors = SensorSimulator::default();
        for mode in ReportingMode::ALL {
            let packet =
                build_data_report(mode, 0, &mut sensors, &IrPointer::default(), &registers);
            assert_eq!(packet.len(), mode.layout().size, "{:?}", mode);
            assert_eq!(packet[0], 0xA1);
            assert_eq!(packet[1], mode.id());
        }
    }

    #[test]
    fn test_fields_land_at_layout_offsets() {
        let input = ControllerInput {
            accel: Accelerometer { x: 0.5, y: -0.5, z: 1.0 },
            ..Default::default()
        };
        let pointer = IrPointer::default();

        for mode in ReportingMode::ALL {
            let layout = mode.layout();
            let ir_mode = if layout.ir_len() >= IR_EXTENDED_LEN {
                IR_MODE_EXTENDED
            } else {
                IR_MODE_BASIC
            };
            let registers = ir_ready(ir_mode);
            let mut sensors = SensorSimulator::default();
            sensors.update(&input);
            let mut expected_sensors = sensors.clone();

            let packet = build_data_report(mode, BUTTON_A, &mut sensors, &pointer, &registers);
            assert_eq!(packet.len(), layout.size, "{:?}", mode);

            // x = 0x234, y = 0x1CC, z = 0x268: no low bits reach the button bytes
            assert_eq!(&packet[layout.core..layout.core + 2], &[0x00, 0x08], "{:?}", mode);

            if layout.has_accel() {
                let accel = &packet[layout.accel..layout.accel + 3];
                assert_eq!(accel, &[0x8D, 0x73, 0x9A], "{:?}", mode);
            }

            if layout.has_ir() {
                let field = &packet[layout.ir..layout.ir + layout.ir_len()];
                let dots = expected_sensors.project_ir(&pointer, layout.has_accel());
                let mut expected = vec![0u8; layout.ir_len()];
                assert!(SensorSimulator::encode_ir(&dots, ir_mode, &mut expected));
                assert_eq!(field, &expected[..], "{:?}", mode);
                assert!(field.iter().any(|&b| b != 0xFF), "{:?}", mode);
            }

            if layout.has_ext() {
                assert_eq!(packet.len() - layout.ext, layout.ext_len());
                assert!(packet[layout.ext..].iter().all(|&b| b == 0), "{:?}", mode);
            }

            // Nothing but the declared fields is populated
            let end_of_fields = [
                layout.core + 2,
                if layout.has_accel() { layout.accel + 3 } else { 0 },
                layout.ir + layout.ir_len(),
            ]
            .into_iter()
            .max()
            .unwrap_or(0);
            assert!(packet[end_of_fields..].iter().all(|&b| b == 0), "{:?}", mode);
        }
    }

    #[test]
    fn test_core_buttons_little_endian() {
        let registers = RegisterFile::new();
        let mut sensors = SensorSimulator::default();
        let packet = build_data_report(
            ReportingMode::Core,
            BUTTON_A,
            &mut sensors,
            &IrPointer::default(),
            &registers,
        );
        assert_eq!(packet, vec![0xA1, 0x30, 0x00, 0x08]);
    }

    #[test]
    fn test_accel_ir_report() {
        let registers = ir_ready(IR_MODE_EXTENDED);
        let mut sensors = SensorSimulator::default();
        sensors.update(&ControllerInput::default());

        let packet = build_data_report(
            ReportingMode::CoreAccelIr12,
            0,
            &mut sensors,
            &IrPointer::default(),
            &registers,
        );

        assert_eq!(packet.len(), 19);
        // Resting flat: x = y = 0 g, z = 1 g
        assert_eq!(&packet[4..7], &[0x80, 0x80, 0x9A]);
        // Centered pointer: every dot visible with size 10
        for dot in packet[7..19].chunks(3) {
            assert_ne!(dot, &[0xFF, 0xFF, 0xFF]);
            assert_eq!(dot[2] & 0x0F, 10);
        }
    }

    #[test]
    fn test_ir_skipped_when_camera_disabled() {
        let registers = RegisterFile::new();
        let mut sensors = SensorSimulator::default();
        let packet = build_data_report(
            ReportingMode::CoreAccelIr12,
            0,
            &mut sensors,
            &IrPointer::default(),
            &registers,
        );
        assert!(packet[7..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_basic_ir_in_ten_byte_field() {
        let registers = ir_ready(IR_MODE_BASIC);
        let mut sensors = SensorSimulator::default();
        let packet = build_data_report(
            ReportingMode::CoreIr10Ext9,
            0,
            &mut sensors,
            &IrPointer::default(),
            &registers,
        );
        assert_eq!(packet.len(), 23);
        assert!(packet[4..14].iter().any(|&b| b != 0xFF));
        assert!(packet[14..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_extended_ir_rejected_in_ten_byte_field() {
        let registers = ir_ready(IR_MODE_EXTENDED);
        let mut sensors = SensorSimulator::default();
        let packet = build_data_report(
            ReportingMode::CoreIr10Ext9,
            0,
            &mut sensors,
            &IrPointer::default(),
            &registers,
        );
        assert!(packet[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_accel_saturates() {
        let registers = RegisterFile::new();
        let mut sensors = SensorSimulator::default();
        sensors.update(&ControllerInput {
            accel: Accelerometer { x: 50.0, y: -50.0, z: 0.0 },
            ..Default::default()
        });
        let packet = build_data_report(
            ReportingMode::CoreAccel,
            0,
            &mut sensors,
            &IrPointer::default(),
            &registers,
        );
        assert_eq!(&packet[4..7], &[0xFF, 0x00, 0x80]);
        // x = 0x3FF sets both low bits, y = 0 clears its bit
        assert_eq!(packet[2] & 0x60, 0x60);
        assert_eq!(packet[3] & 0x20, 0x00);
    }
}
