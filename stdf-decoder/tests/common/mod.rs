//! Synthetic STDF files for integration tests

#![allow(dead_code)]

use std::io::Write;
use stdf_decoder::formats::writer::{encode_kind, encode_record, encode_with_length, far_record, PayloadBuilder};
use stdf_decoder::{Endian, RecordKind};
use tempfile::NamedTempFile;

/// Appends records to an in-memory STDF stream, FAR first
pub struct StdfBuilder {
    endian: Endian,
    bytes: Vec<u8>,
}

impl StdfBuilder {
    pub fn new(endian: Endian) -> Self {
        Self {
            endian,
            bytes: far_record(endian),
        }
    }

    fn payload(&self) -> PayloadBuilder {
        PayloadBuilder::new(self.endian)
    }

    fn push(mut self, kind: RecordKind, payload: Vec<u8>) -> Self {
        self.bytes.extend(encode_kind(kind, &payload, self.endian));
        self
    }

    /// MIR with lot id, job name, empty FACIL_ID and a floor id
    pub fn mir(self, lot_id: &str, job_nam: &str, floor_id: &str, start_t: u32) -> Self {
        let mut p = self
            .payload()
            .u4(start_t)
            .u4(start_t)
            .u1(1)
            .c1('P')
            .c1(' ')
            .c1(' ')
            .u2(0)
            .c1(' ')
            .cn(lot_id)
            .cn("PT-1")
            .cn("")
            .cn("TESTER")
            .cn(job_nam)
            .cn("rev3")
            .cn("SB01")
            .cn("");
        // EXEC_TYP through DATE_COD
        for _ in 0..9 {
            p = p.cn("");
        }
        let payload = p.cn("").cn(floor_id).build();
        self.push(RecordKind::Mir, payload)
    }

    pub fn pir(self) -> Self {
        let payload = self.payload().u1(1).u1(1).build();
        self.push(RecordKind::Pir, payload)
    }

    pub fn ptr(self, test_num: u32, test_txt: &str, result: f32) -> Self {
        let payload = self
            .payload()
            .u4(test_num)
            .u1(1)
            .u1(1)
            .u1(0)
            .u1(0)
            .r4(result)
            .cn(test_txt)
            .cn("")
            .u1(0)
            .i1(0)
            .i1(0)
            .i1(0)
            .r4(0.0)
            .r4(1.0)
            .cn("V")
            .build();
        self.push(RecordKind::Ptr, payload)
    }

    pub fn mpr(self, test_num: u32, test_txt: &str, results: &[f32]) -> Self {
        let payload = self
            .payload()
            .u4(test_num)
            .u1(1)
            .u1(1)
            .u1(0)
            .u1(0)
            .u2(0)
            .u2(results.len() as u16)
            .xr4(results)
            .cn(test_txt)
            .build();
        self.push(RecordKind::Mpr, payload)
    }

    /// FTR with no index arrays and no bit fields
    pub fn ftr(self, test_num: u32, test_txt: &str) -> Self {
        let payload = self
            .payload()
            .u4(test_num)
            .u1(1)
            .u1(1)
            .u1(0)
            .u1(0)
            .u4(0)
            .u4(0)
            .u4(0)
            .u4(0)
            .i4(0)
            .i4(0)
            .i2(0)
            .u2(0)
            .u2(0)
            .dn(0, &[])
            .cn("")
            .cn("")
            .cn("")
            .cn(test_txt)
            .build();
        self.push(RecordKind::Ftr, payload)
    }

    pub fn prr(self, part_id: &str, soft_bin: u16, x: i16, y: i16) -> Self {
        let payload = self
            .payload()
            .u1(1)
            .u1(1)
            .u1(0)
            .u2(3)
            .u2(soft_bin)
            .u2(soft_bin)
            .i2(x)
            .i2(y)
            .u4(12)
            .cn(part_id)
            .build();
        self.push(RecordKind::Prr, payload)
    }

    /// A PTR whose header promises only three payload bytes
    pub fn truncated_ptr(mut self) -> Self {
        self.bytes.extend(encode_with_length(15, 10, 3, &[1, 2, 3], self.endian));
        self
    }

    /// A record of a kind the decoder does not interpret
    pub fn unknown(mut self) -> Self {
        self.bytes.extend(encode_record(50, 30, &[0xAB; 5], self.endian));
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_temp(self) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&self.bytes).unwrap();
        file.flush().unwrap();
        file
    }
}

/// Three devices, two tagged tests (one with three values) and one untagged
pub fn wafer(endian: Endian) -> StdfBuilder {
    StdfBuilder::new(endian)
        .mir("LOT42", "JOB-A", "FLOOR-2", 1_700_000_000)
        .pir()
        .ptr(100, "VDD;Pixel=R1C2", 1.25)
        .mpr(200, "Pixel=R3C4;IDD", &[0.5, 1.5, 2.5])
        .ptr(300, "LEAKAGE", 9.0)
        .prr("DIE-1", 1, 10, 20)
        .pir()
        .prr("DIE-2", 1, 11, 20)
        .pir()
        .prr("DIE-3", 7, 12, 20)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
