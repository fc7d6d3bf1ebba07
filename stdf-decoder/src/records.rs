//! Typed STDF record layouts
//!
//! Each struct mirrors one record's field order on the wire. Parsing is
//! dispatched once on the record kind; nothing outside this module touches a
//! raw payload.

use crate::formats::{BitField, FieldCursor, RawText};
use crate::types::{Endian, FieldError, RecordKind};

type FieldResult<T> = std::result::Result<T, FieldError>;

/// Optional variable-length text
pub type Text = Option<RawText>;

/// File Attributes Record
#[derive(Debug, Clone, PartialEq)]
pub struct Far {
    pub cpu_type: u8,
    pub stdf_ver: u8,
}

/// Master Information Record
#[derive(Debug, Clone, PartialEq)]
pub struct Mir {
    pub setup_t: u32,
    pub start_t: u32,
    pub stat_num: u8,
    pub mode_cod: char,
    pub rtst_cod: char,
    pub prot_cod: char,
    pub burn_tim: u16,
    pub cmod_cod: char,
    pub lot_id: Text,
    pub part_typ: Text,
    pub node_nam: Text,
    pub tstr_typ: Text,
    pub job_nam: Text,
    pub job_rev: Text,
    pub sblot_id: Text,
    pub oper_nam: Text,
    pub exec_typ: Text,
    pub exec_ver: Text,
    pub test_cod: Text,
    pub tst_temp: Text,
    pub user_txt: Text,
    pub aux_file: Text,
    pub pkg_typ: Text,
    pub family_id: Text,
    pub date_cod: Text,
    pub facil_id: Text,
    pub floor_id: Text,
    pub proc_id: Text,
    pub oper_frq: Text,
    pub spec_nam: Text,
    pub spec_ver: Text,
    pub flow_id: Text,
    pub setup_id: Text,
    pub dsgn_rev: Text,
    pub eng_id: Text,
    pub rom_cod: Text,
    pub serl_num: Text,
    pub supr_nam: Text,
}

/// Hardware or software bin summary (HBR and SBR share a layout)
#[derive(Debug, Clone, PartialEq)]
pub struct BinRecord {
    pub head_num: u8,
    pub site_num: u8,
    pub bin_num: u16,
    pub bin_cnt: u32,
    pub bin_pf: char,
    pub bin_nam: Text,
}

/// Part Information Record
#[derive(Debug, Clone, PartialEq)]
pub struct Pir {
    pub head_num: u8,
    pub site_num: u8,
}

/// Part Results Record
#[derive(Debug, Clone, PartialEq)]
pub struct Prr {
    pub head_num: u8,
    pub site_num: u8,
    pub part_flg: u8,
    pub num_test: u16,
    pub hard_bin: u16,
    pub soft_bin: u16,
    pub x_coord: i16,
    pub y_coord: i16,
    pub test_t: u32,
    pub part_id: Text,
    pub part_txt: Text,
    pub part_fix: Option<Vec<u8>>,
}

/// Parametric Test Record
#[derive(Debug, Clone, PartialEq)]
pub struct Ptr {
    pub test_num: u32,
    pub head_num: u8,
    pub site_num: u8,
    pub test_flg: u8,
    pub parm_flg: u8,
    pub result: f32,
    pub test_txt: Text,
    pub alarm_id: Text,
    pub opt_flag: u8,
    pub res_scal: i8,
    pub llm_scal: i8,
    pub hlm_scal: i8,
    pub lo_limit: f32,
    pub hi_limit: f32,
    pub units: Text,
    pub c_resfmt: Text,
    pub c_llmfmt: Text,
    pub c_hlmfmt: Text,
    pub lo_spec: f32,
    pub hi_spec: f32,
}

/// Multiple-Result Parametric Record
#[derive(Debug, Clone, PartialEq)]
pub struct Mpr {
    pub test_num: u32,
    pub head_num: u8,
    pub site_num: u8,
    pub test_flg: u8,
    pub parm_flg: u8,
    /// Paired count for `rtn_stat` and `rtn_indx`
    pub rtn_icnt: u16,
    /// Paired count for `rtn_rslt`
    pub rslt_cnt: u16,
    pub rtn_stat: Option<Vec<u8>>,
    pub rtn_rslt: Option<Vec<f32>>,
    pub test_txt: Text,
    pub alarm_id: Text,
    pub opt_flag: u8,
    pub res_scal: i8,
    pub llm_scal: i8,
    pub hlm_scal: i8,
    pub lo_limit: f32,
    pub hi_limit: f32,
    pub start_in: f32,
    pub incr_in: f32,
    pub rtn_indx: Option<Vec<u16>>,
    pub units: Text,
    pub units_in: Text,
    pub c_resfmt: Text,
    pub c_llmfmt: Text,
    pub c_hlmfmt: Text,
    pub lo_spec: f32,
    pub hi_spec: f32,
}

/// Functional Test Record
#[derive(Debug, Clone, PartialEq)]
pub struct Ftr {
    pub test_num: u32,
    pub head_num: u8,
    pub site_num: u8,
    pub test_flg: u8,
    pub opt_flag: u8,
    pub cycl_cnt: u32,
    pub rel_vadr: u32,
    pub rept_cnt: u32,
    pub num_fail: u32,
    pub xfail_ad: i32,
    pub yfail_ad: i32,
    pub vect_off: i16,
    /// Paired count for `rtn_indx` and `rtn_stat`
    pub rtn_icnt: u16,
    /// Paired count for `pgm_indx` and `pgm_stat`
    pub pgm_icnt: u16,
    pub rtn_indx: Option<Vec<u16>>,
    pub rtn_stat: Option<Vec<u8>>,
    pub pgm_indx: Option<Vec<u16>>,
    pub pgm_stat: Option<Vec<u8>>,
    pub fail_pin: Option<BitField>,
    pub vect_nam: Text,
    pub time_set: Text,
    pub op_code: Text,
    pub test_txt: Text,
    pub alarm_id: Text,
    pub prog_txt: Text,
    pub rslt_txt: Text,
    pub patg_num: u8,
    pub spin_map: Option<BitField>,
}

/// Decoded payload of a known record kind
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBody {
    Far(Far),
    Mir(Box<Mir>),
    Hbr(BinRecord),
    Sbr(BinRecord),
    Pir(Pir),
    Prr(Box<Prr>),
    Ptr(Box<Ptr>),
    Mpr(Box<Mpr>),
    Ftr(Box<Ftr>),
}

impl RecordBody {
    /// Decode a payload whose header says it is `kind`
    ///
    /// The whole payload must be consumed: leftover bytes, or a field that
    /// runs past the end, make the record corrupt.
    pub fn parse(kind: RecordKind, payload: &[u8], endian: Endian) -> FieldResult<Self> {
        let mut c = FieldCursor::new(payload, endian);
        let body = match kind {
            RecordKind::Far => RecordBody::Far(Far {
                cpu_type: c.u1()?,
                stdf_ver: c.u1()?,
            }),
            RecordKind::Mir => RecordBody::Mir(Box::new(read_mir(&mut c)?)),
            RecordKind::Hbr => RecordBody::Hbr(read_bin(&mut c)?),
            RecordKind::Sbr => RecordBody::Sbr(read_bin(&mut c)?),
            RecordKind::Pir => RecordBody::Pir(Pir {
                head_num: c.u1()?,
                site_num: c.u1()?,
            }),
            RecordKind::Prr => RecordBody::Prr(Box::new(read_prr(&mut c)?)),
            RecordKind::Ptr => RecordBody::Ptr(Box::new(read_ptr(&mut c)?)),
            RecordKind::Mpr => RecordBody::Mpr(Box::new(read_mpr(&mut c)?)),
            RecordKind::Ftr => RecordBody::Ftr(Box::new(read_ftr(&mut c)?)),
        };
        c.finish()?;
        Ok(body)
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            RecordBody::Far(_) => RecordKind::Far,
            RecordBody::Mir(_) => RecordKind::Mir,
            RecordBody::Hbr(_) => RecordKind::Hbr,
            RecordBody::Sbr(_) => RecordKind::Sbr,
            RecordBody::Pir(_) => RecordKind::Pir,
            RecordBody::Prr(_) => RecordKind::Prr,
            RecordBody::Ptr(_) => RecordKind::Ptr,
            RecordBody::Mpr(_) => RecordKind::Mpr,
            RecordBody::Ftr(_) => RecordKind::Ftr,
        }
    }
}

fn read_mir(c: &mut FieldCursor<'_>) -> FieldResult<Mir> {
    Ok(Mir {
        setup_t: c.u4()?,
        start_t: c.u4()?,
        stat_num: c.u1()?,
        mode_cod: c.c1()?,
        rtst_cod: c.c1()?,
        prot_cod: c.c1()?,
        burn_tim: c.u2()?,
        cmod_cod: c.c1()?,
        lot_id: c.cn()?,
        part_typ: c.cn()?,
        node_nam: c.cn()?,
        tstr_typ: c.cn()?,
        job_nam: c.cn()?,
        job_rev: c.cn()?,
        sblot_id: c.cn()?,
        oper_nam: c.cn()?,
        exec_typ: c.cn()?,
        exec_ver: c.cn()?,
        test_cod: c.cn()?,
        tst_temp: c.cn()?,
        user_txt: c.cn()?,
        aux_file: c.cn()?,
        pkg_typ: c.cn()?,
        family_id: c.cn()?,
        date_cod: c.cn()?,
        facil_id: c.cn()?,
        floor_id: c.cn()?,
        proc_id: c.cn()?,
        oper_frq: c.cn()?,
        spec_nam: c.cn()?,
        spec_ver: c.cn()?,
        flow_id: c.cn()?,
        setup_id: c.cn()?,
        dsgn_rev: c.cn()?,
        eng_id: c.cn()?,
        rom_cod: c.cn()?,
        serl_num: c.cn()?,
        supr_nam: c.cn()?,
    })
}

fn read_bin(c: &mut FieldCursor<'_>) -> FieldResult<BinRecord> {
    Ok(BinRecord {
        head_num: c.u1()?,
        site_num: c.u1()?,
        bin_num: c.u2()?,
        bin_cnt: c.u4()?,
        bin_pf: c.c1()?,
        bin_nam: c.cn()?,
    })
}

fn read_prr(c: &mut FieldCursor<'_>) -> FieldResult<Prr> {
    Ok(Prr {
        head_num: c.u1()?,
        site_num: c.u1()?,
        part_flg: c.u1()?,
        num_test: c.u2()?,
        hard_bin: c.u2()?,
        soft_bin: c.u2()?,
        x_coord: c.i2()?,
        y_coord: c.i2()?,
        test_t: c.u4()?,
        part_id: c.cn()?,
        part_txt: c.cn()?,
        part_fix: c.bn()?,
    })
}

fn read_ptr(c: &mut FieldCursor<'_>) -> FieldResult<Ptr> {
    Ok(Ptr {
        test_num: c.u4()?,
        head_num: c.u1()?,
        site_num: c.u1()?,
        test_flg: c.u1()?,
        parm_flg: c.u1()?,
        result: c.r4()?,
        test_txt: c.cn()?,
        alarm_id: c.cn()?,
        opt_flag: c.u1()?,
        res_scal: c.i1()?,
        llm_scal: c.i1()?,
        hlm_scal: c.i1()?,
        lo_limit: c.r4()?,
        hi_limit: c.r4()?,
        units: c.cn()?,
        c_resfmt: c.cn()?,
        c_llmfmt: c.cn()?,
        c_hlmfmt: c.cn()?,
        lo_spec: c.r4()?,
        hi_spec: c.r4()?,
    })
}

fn read_mpr(c: &mut FieldCursor<'_>) -> FieldResult<Mpr> {
    let test_num = c.u4()?;
    let head_num = c.u1()?;
    let site_num = c.u1()?;
    let test_flg = c.u1()?;
    let parm_flg = c.u1()?;
    // Counts come first and bound every array that follows
    let rtn_icnt = c.u2()?;
    let rslt_cnt = c.u2()?;
    Ok(Mpr {
        test_num,
        head_num,
        site_num,
        test_flg,
        parm_flg,
        rtn_icnt,
        rslt_cnt,
        rtn_stat: c.xn1(rtn_icnt)?,
        rtn_rslt: c.xr4(rslt_cnt)?,
        test_txt: c.cn()?,
        alarm_id: c.cn()?,
        opt_flag: c.u1()?,
        res_scal: c.i1()?,
        llm_scal: c.i1()?,
        hlm_scal: c.i1()?,
        lo_limit: c.r4()?,
        hi_limit: c.r4()?,
        start_in: c.r4()?,
        incr_in: c.r4()?,
        rtn_indx: c.xu2(rtn_icnt)?,
        units: c.cn()?,
        units_in: c.cn()?,
        c_resfmt: c.cn()?,
        c_llmfmt: c.cn()?,
        c_hlmfmt: c.cn()?,
        lo_spec: c.r4()?,
        hi_spec: c.r4()?,
    })
}

fn read_ftr(c: &mut FieldCursor<'_>) -> FieldResult<Ftr> {
    let test_num = c.u4()?;
    let head_num = c.u1()?;
    let site_num = c.u1()?;
    let test_flg = c.u1()?;
    let opt_flag = c.u1()?;
    let cycl_cnt = c.u4()?;
    let rel_vadr = c.u4()?;
    let rept_cnt = c.u4()?;
    let num_fail = c.u4()?;
    let xfail_ad = c.i4()?;
    let yfail_ad = c.i4()?;
    let vect_off = c.i2()?;
    let rtn_icnt = c.u2()?;
    let pgm_icnt = c.u2()?;
    Ok(Ftr {
        test_num,
        head_num,
        site_num,
        test_flg,
        opt_flag,
        cycl_cnt,
        rel_vadr,
        rept_cnt,
        num_fail,
        xfail_ad,
        yfail_ad,
        vect_off,
        rtn_icnt,
        pgm_icnt,
        rtn_indx: c.xu2(rtn_icnt)?,
        rtn_stat: c.xn1(rtn_icnt)?,
        pgm_indx: c.xu2(pgm_icnt)?,
        pgm_stat: c.xn1(pgm_icnt)?,
        fail_pin: c.dn()?,
        vect_nam: c.cn()?,
        time_set: c.cn()?,
        op_code: c.cn()?,
        test_txt: c.cn()?,
        alarm_id: c.cn()?,
        prog_txt: c.cn()?,
        rslt_txt: c.cn()?,
        patg_num: c.u1()?,
        spin_map: c.dn()?,
    })
}
