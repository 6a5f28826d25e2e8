//! Per-processor statistics.
//!
//! Each `cpu:N:sys` set is paired with its `cpu:N:vm` companion for the
//! fault counters. The companion has its own capture times, so its rates
//! use its own elapsed interval.

use std::io::{self, Write};

use tracing::debug;

use crate::engine::{CycleHandler, CycleView};
use crate::error::KarError;
use crate::fmt::{self, OutputFormat};
use crate::model::{MetricKey, Snapshot};
use crate::rates::{
    NANOS_PER_SEC, elapsed, percentage, rate_per_second, raw_delta, raw_delta_sum, round_half_up,
};

use super::{Report, is_cpu_sys, spans_uptime};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MpstatRow {
    pub cpu: u32,
    pub minf: i64,
    pub mjf: i64,
    pub xcal: i64,
    pub intr: i64,
    pub ithr: i64,
    pub csw: i64,
    pub icsw: i64,
    pub migr: i64,
    pub smtx: i64,
    pub srw: i64,
    pub syscl: i64,
    pub usr: i64,
    pub sys: i64,
    pub idl: i64,
    pub midpoint: i64,
}

impl MpstatRow {
    fn fields(&self) -> [(&'static str, i64); 14] {
        [
            ("minf", self.minf),
            ("mjf", self.mjf),
            ("xcal", self.xcal),
            ("intr", self.intr),
            ("ithr", self.ithr),
            ("csw", self.csw),
            ("icsw", self.icsw),
            ("migr", self.migr),
            ("smtx", self.smtx),
            ("srw", self.srw),
            ("syscl", self.syscl),
            ("usr", self.usr),
            ("sys", self.sys),
            ("idl", self.idl),
        ]
    }
}

pub struct MpstatReport {
    format: OutputFormat,
    cycles: Vec<(i64, Vec<MpstatRow>)>,
}

fn per_sec(delta: i64, el: i64) -> Result<i64, KarError> {
    Ok(round_half_up(rate_per_second(delta, el, NANOS_PER_SEC)?))
}

fn pct(delta: i64, el: i64) -> Result<i64, KarError> {
    Ok(round_half_up(percentage(delta, el, NANOS_PER_SEC)?))
}

impl MpstatReport {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            cycles: Vec::new(),
        }
    }

    pub fn cycles(&self) -> &[(i64, Vec<MpstatRow>)] {
        &self.cycles
    }

    fn compute(
        view: &CycleView<'_>,
        current: &Snapshot,
        prior: Option<&Snapshot>,
    ) -> Result<MpstatRow, KarError> {
        let el = elapsed(current, prior);
        let mut row = MpstatRow {
            cpu: current.key.instance,
            xcal: per_sec(raw_delta(current, prior, "xcalls"), el)?,
            intr: per_sec(raw_delta(current, prior, "intr"), el)?,
            ithr: per_sec(raw_delta(current, prior, "intrthread"), el)?,
            csw: per_sec(raw_delta(current, prior, "pswitch"), el)?,
            icsw: per_sec(raw_delta(current, prior, "inv_swtch"), el)?,
            migr: per_sec(raw_delta(current, prior, "cpumigrate"), el)?,
            smtx: per_sec(raw_delta(current, prior, "mutex_adenters"), el)?,
            srw: per_sec(raw_delta_sum(current, prior, &["rw_rdfails", "rw_wrfails"]), el)?,
            syscl: per_sec(raw_delta(current, prior, "syscall"), el)?,
            usr: pct(raw_delta(current, prior, "cpu_nsec_user"), el)?,
            sys: pct(raw_delta(current, prior, "cpu_nsec_kernel"), el)?,
            idl: pct(raw_delta(current, prior, "cpu_nsec_idle"), el)?,
            midpoint: fmt::midpoint_secs(view.timestamp, el),
            ..Default::default()
        };

        let vm_key = MetricKey::new("cpu", current.key.instance, "vm");
        match view.current(&vm_key) {
            Some(vm) => {
                let vm_prior = view.prior(&vm_key);
                let vm_el = elapsed(vm, vm_prior);
                row.minf = per_sec(raw_delta_sum(vm, vm_prior, &["hat_fault", "as_fault"]), vm_el)?;
                row.mjf = per_sec(raw_delta(vm, vm_prior, "maj_fault"), vm_el)?;
            }
            None => debug!("mpstat: no {} for {}", vm_key, current.key),
        }
        Ok(row)
    }

    fn render_table(&self, out: &mut dyn Write) -> io::Result<()> {
        for (timestamp, rows) in &self.cycles {
            writeln!(out, "{}    processor statistics", fmt::clock(*timestamp))?;
            writeln!(
                out,
                "CPU minf mjf xcal  intr ithr  csw icsw migr smtx  srw syscl  usr sys idl"
            )?;
            for r in rows {
                writeln!(
                    out,
                    "{:3} {:4} {:3} {:4} {:5} {:4} {:4} {:4} {:4} {:4} {:4} {:5}  {:3} {:3} {:3}",
                    r.cpu,
                    r.minf,
                    r.mjf,
                    r.xcal,
                    r.intr,
                    r.ithr,
                    r.csw,
                    r.icsw,
                    r.migr,
                    r.smtx,
                    r.srw,
                    r.syscl,
                    r.usr,
                    r.sys,
                    r.idl
                )?;
            }
        }
        Ok(())
    }

    fn render_graphite(&self, out: &mut dyn Write) -> io::Result<()> {
        for r in self.cycles.iter().flat_map(|(_, rows)| rows) {
            for (field, value) in r.fields() {
                fmt::graphite_i64(out, &format!("mpstat.{}.{}", r.cpu, field), value, r.midpoint)?;
            }
        }
        Ok(())
    }
}

impl CycleHandler for MpstatReport {
    fn accepts(&self, snapshot: &Snapshot) -> bool {
        is_cpu_sys(snapshot)
    }

    fn begin_cycle(&mut self, view: &CycleView<'_>) {
        self.cycles.push((view.timestamp, Vec::new()));
    }

    fn on_snapshot(&mut self, view: &CycleView<'_>, current: &Snapshot, prior: Option<&Snapshot>) {
        if self.format == OutputFormat::Graphite && spans_uptime(view, prior) {
            return;
        }
        match Self::compute(view, current, prior) {
            Ok(row) => {
                if let Some((_, rows)) = self.cycles.last_mut() {
                    rows.push(row);
                }
            }
            Err(e) => debug!("mpstat: skipping {}: {}", current.key, e),
        }
    }
}

impl Report for MpstatReport {
    fn render(&self, out: &mut dyn Write) -> io::Result<()> {
        match self.format {
            OutputFormat::Table => self.render_table(out),
            OutputFormat::Graphite => self.render_graphite(out),
        }
    }
}
