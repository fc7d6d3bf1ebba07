//! Static per-kind field catalogs
//!
//! Each catalog lists a record kind's fields in wire order together with an
//! accessor that renders that field from a decoded body. Accessors match on
//! the body variant first, so a catalog entry can never read a field from a
//! record of another kind.

use super::render::{render_bytes, RenderField};
use crate::records::RecordBody;
use crate::types::RecordKind;

/// Renders one field of a decoded body; `None` when absent or wrong kind
pub type Accessor = fn(&RecordBody) -> Option<String>;

/// One catalog entry
#[derive(Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub render: Accessor,
}

impl std::fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

macro_rules! catalog {
    (@render $value:expr) => {
        RenderField::render(&$value)
    };
    (@render $value:expr, bytes) => {
        render_bytes(&$value)
    };
    ($table:ident, $variant:ident, [$($name:literal => $field:ident $(as $how:ident)?),* $(,)?]) => {
        static $table: &[FieldDef] = &[
            $(
                FieldDef {
                    name: $name,
                    render: |body| match body {
                        RecordBody::$variant(r) => catalog!(@render r.$field $(, $how)?),
                        _ => None,
                    },
                },
            )*
        ];
    };
}

catalog!(FAR_FIELDS, Far, [
    "CPU_TYPE" => cpu_type,
    "STDF_VER" => stdf_ver,
]);

catalog!(MIR_FIELDS, Mir, [
    "SETUP_T" => setup_t,
    "START_T" => start_t,
    "STAT_NUM" => stat_num,
    "MODE_COD" => mode_cod,
    "RTST_COD" => rtst_cod,
    "PROT_COD" => prot_cod,
    "BURN_TIM" => burn_tim,
    "CMOD_COD" => cmod_cod,
    "LOT_ID" => lot_id,
    "PART_TYP" => part_typ,
    "NODE_NAM" => node_nam,
    "TSTR_TYP" => tstr_typ,
    "JOB_NAM" => job_nam,
    "JOB_REV" => job_rev,
    "SBLOT_ID" => sblot_id,
    "OPER_NAM" => oper_nam,
    "EXEC_TYP" => exec_typ,
    "EXEC_VER" => exec_ver,
    "TEST_COD" => test_cod,
    "TST_TEMP" => tst_temp,
    "USER_TXT" => user_txt,
    "AUX_FILE" => aux_file,
    "PKG_TYP" => pkg_typ,
    "FAMILY_ID" => family_id,
    "DATE_COD" => date_cod,
    "FACIL_ID" => facil_id,
    "FLOOR_ID" => floor_id,
    "PROC_ID" => proc_id,
    "OPER_FRQ" => oper_frq,
    "SPEC_NAM" => spec_nam,
    "SPEC_VER" => spec_ver,
    "FLOW_ID" => flow_id,
    "SETUP_ID" => setup_id,
    "DSGN_REV" => dsgn_rev,
    "ENG_ID" => eng_id,
    "ROM_COD" => rom_cod,
    "SERL_NUM" => serl_num,
    "SUPR_NAM" => supr_nam,
]);

catalog!(HBR_FIELDS, Hbr, [
    "HEAD_NUM" => head_num,
    "SITE_NUM" => site_num,
    "HBIN_NUM" => bin_num,
    "HBIN_CNT" => bin_cnt,
    "HBIN_PF" => bin_pf,
    "HBIN_NAM" => bin_nam,
]);

catalog!(SBR_FIELDS, Sbr, [
    "HEAD_NUM" => head_num,
    "SITE_NUM" => site_num,
    "SBIN_NUM" => bin_num,
    "SBIN_CNT" => bin_cnt,
    "SBIN_PF" => bin_pf,
    "SBIN_NAM" => bin_nam,
]);

catalog!(PIR_FIELDS, Pir, [
    "HEAD_NUM" => head_num,
    "SITE_NUM" => site_num,
]);

catalog!(PRR_FIELDS, Prr, [
    "HEAD_NUM" => head_num,
    "SITE_NUM" => site_num,
    "PART_FLG" => part_flg,
    "NUM_TEST" => num_test,
    "HARD_BIN" => hard_bin,
    "SOFT_BIN" => soft_bin,
    "X_COORD" => x_coord,
    "Y_COORD" => y_coord,
    "TEST_T" => test_t,
    "PART_ID" => part_id,
    "PART_TXT" => part_txt,
    "PART_FIX" => part_fix as bytes,
]);

catalog!(PTR_FIELDS, Ptr, [
    "TEST_NUM" => test_num,
    "HEAD_NUM" => head_num,
    "SITE_NUM" => site_num,
    "TEST_FLG" => test_flg,
    "PARM_FLG" => parm_flg,
    "RESULT" => result,
    "TEST_TXT" => test_txt,
    "ALARM_ID" => alarm_id,
    "OPT_FLAG" => opt_flag,
    "RES_SCAL" => res_scal,
    "LLM_SCAL" => llm_scal,
    "HLM_SCAL" => hlm_scal,
    "LO_LIMIT" => lo_limit,
    "HI_LIMIT" => hi_limit,
    "UNITS" => units,
    "C_RESFMT" => c_resfmt,
    "C_LLMFMT" => c_llmfmt,
    "C_HLMFMT" => c_hlmfmt,
    "LO_SPEC" => lo_spec,
    "HI_SPEC" => hi_spec,
]);

catalog!(MPR_FIELDS, Mpr, [
    "TEST_NUM" => test_num,
    "HEAD_NUM" => head_num,
    "SITE_NUM" => site_num,
    "TEST_FLG" => test_flg,
    "PARM_FLG" => parm_flg,
    "RTN_ICNT" => rtn_icnt,
    "RSLT_CNT" => rslt_cnt,
    "RTN_STAT" => rtn_stat,
    "RTN_RSLT" => rtn_rslt,
    "TEST_TXT" => test_txt,
    "ALARM_ID" => alarm_id,
    "OPT_FLAG" => opt_flag,
    "RES_SCAL" => res_scal,
    "LLM_SCAL" => llm_scal,
    "HLM_SCAL" => hlm_scal,
    "LO_LIMIT" => lo_limit,
    "HI_LIMIT" => hi_limit,
    "START_IN" => start_in,
    "INCR_IN" => incr_in,
    "RTN_INDX" => rtn_indx,
    "UNITS" => units,
    "UNITS_IN" => units_in,
    "C_RESFMT" => c_resfmt,
    "C_LLMFMT" => c_llmfmt,
    "C_HLMFMT" => c_hlmfmt,
    "LO_SPEC" => lo_spec,
    "HI_SPEC" => hi_spec,
]);

catalog!(FTR_FIELDS, Ftr, [
    "TEST_NUM" => test_num,
    "HEAD_NUM" => head_num,
    "SITE_NUM" => site_num,
    "TEST_FLG" => test_flg,
    "OPT_FLAG" => opt_flag,
    "CYCL_CNT" => cycl_cnt,
    "REL_VADR" => rel_vadr,
    "REPT_CNT" => rept_cnt,
    "NUM_FAIL" => num_fail,
    "XFAIL_AD" => xfail_ad,
    "YFAIL_AD" => yfail_ad,
    "VECT_OFF" => vect_off,
    "RTN_ICNT" => rtn_icnt,
    "PGM_ICNT" => pgm_icnt,
    "RTN_INDX" => rtn_indx,
    "RTN_STAT" => rtn_stat,
    "PGM_INDX" => pgm_indx,
    "PGM_STAT" => pgm_stat,
    "FAIL_PIN" => fail_pin,
    "VECT_NAM" => vect_nam,
    "TIME_SET" => time_set,
    "OP_CODE" => op_code,
    "TEST_TXT" => test_txt,
    "ALARM_ID" => alarm_id,
    "PROG_TXT" => prog_txt,
    "RSLT_TXT" => rslt_txt,
    "PATG_NUM" => patg_num,
    "SPIN_MAP" => spin_map,
]);

/// Every field of `kind`, in wire order
pub fn catalog(kind: RecordKind) -> &'static [FieldDef] {
    match kind {
        RecordKind::Far => FAR_FIELDS,
        RecordKind::Mir => MIR_FIELDS,
        RecordKind::Hbr => HBR_FIELDS,
        RecordKind::Sbr => SBR_FIELDS,
        RecordKind::Pir => PIR_FIELDS,
        RecordKind::Prr => PRR_FIELDS,
        RecordKind::Ptr => PTR_FIELDS,
        RecordKind::Mpr => MPR_FIELDS,
        RecordKind::Ftr => FTR_FIELDS,
    }
}

/// Look up one field by name (case-insensitive)
pub fn find(kind: RecordKind, name: &str) -> Option<&'static FieldDef> {
    let name = name.trim();
    catalog(kind).iter().find(|def| def.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::RawText;
    use crate::records::{BinRecord, Pir};

    #[test]
    fn test_catalogs_have_unique_names() {
        for kind in RecordKind::ALL {
            let defs = catalog(kind);
            assert!(!defs.is_empty(), "{} has no fields", kind);
            for (i, def) in defs.iter().enumerate() {
                assert!(
                    defs[i + 1..].iter().all(|other| other.name != def.name),
                    "{} lists {} twice",
                    kind,
                    def.name
                );
            }
        }
    }

    #[test]
    fn test_find_is_case_insensitive() {
        assert_eq!(find(RecordKind::Ptr, "test_txt").map(|d| d.name), Some("TEST_TXT"));
        assert!(find(RecordKind::Pir, "TEST_TXT").is_none());
    }

    #[test]
    fn test_accessor_rejects_other_kind() {
        let pir = RecordBody::Pir(Pir { head_num: 1, site_num: 4 });
        let head = find(RecordKind::Pir, "HEAD_NUM").unwrap();
        assert_eq!((head.render)(&pir).as_deref(), Some("1"));

        let prr_head = find(RecordKind::Prr, "HEAD_NUM").unwrap();
        assert_eq!((prr_head.render)(&pir), None);
    }

    #[test]
    fn test_hbr_and_sbr_names() {
        let bin = BinRecord {
            head_num: 1,
            site_num: 1,
            bin_num: 3,
            bin_cnt: 10,
            bin_pf: 'P',
            bin_nam: Some(RawText::from_wire(4, b"GOOD")),
        };
        let sbr = RecordBody::Sbr(bin);
        let name = find(RecordKind::Sbr, "SBIN_NAM").unwrap();
        assert_eq!((name.render)(&sbr).as_deref(), Some("GOOD"));
        let hbin = find(RecordKind::Hbr, "HBIN_NUM").unwrap();
        assert_eq!((hbin.render)(&sbr), None);
    }
}
