//! System-wide CPU summary aggregated over all processors.

use std::io::{self, Write};

use tracing::debug;

use crate::engine::{CycleHandler, CycleView};
use crate::error::KarError;
use crate::fmt::{self, OutputFormat};
use crate::model::Snapshot;
use crate::rates::{
    NANOS_PER_SEC, average_delta, counter_delta, percentage_f64, rate_per_second, round_half_up,
};

use super::{Report, is_cpu_sys, load_averages};

/// Sums and per-CPU averages of one cycle's `cpu::sys` sets.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct CpuAggregate {
    count: u32,
    sysexec: i64,
    intr: i64,
    syscall: i64,
    csw: i64,
    usr: i64,
    sys: i64,
    idl: i64,
    /// Latest capture time of any member.
    snaptime: i64,
    /// Earliest creation time of any member.
    crtime: i64,
}

impl CpuAggregate {
    fn add(&mut self, s: &Snapshot) {
        if self.count == 0 {
            self.snaptime = s.snaptime;
            self.crtime = s.crtime;
        } else {
            self.snaptime = self.snaptime.max(s.snaptime);
            self.crtime = self.crtime.min(s.crtime);
        }
        self.count += 1;
        self.sysexec += s.long("sysexec");
        self.intr += s.long("intr");
        self.syscall += s.long("syscall");
        self.csw += s.long("pswitch") + s.long("inv_swtch");
        self.usr += s.long("cpu_nsec_user");
        self.sys += s.long("cpu_nsec_kernel");
        self.idl += s.long("cpu_nsec_idle");
    }

    fn average(&self, total: i64) -> f64 {
        total as f64 / self.count as f64
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CpustatRow {
    pub timestamp: i64,
    pub load: [f64; 3],
    pub exec: f64,
    pub intr: i64,
    pub syscl: i64,
    pub csw: i64,
    pub usr: i64,
    pub sys: i64,
    pub idl: i64,
    pub midpoint: i64,
}

pub struct CpustatReport {
    format: OutputFormat,
    current: CpuAggregate,
    prior: Option<CpuAggregate>,
    rows: Vec<CpustatRow>,
}

impl CpustatReport {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            current: CpuAggregate::default(),
            prior: None,
            rows: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[CpustatRow] {
        &self.rows
    }

    fn compute(&self, view: &CycleView<'_>) -> Result<CpustatRow, KarError> {
        let cur = &self.current;
        let prior = self.prior.as_ref();
        let el = cur.snaptime - prior.map_or(cur.crtime, |p| p.snaptime);

        let delta = |f: fn(&CpuAggregate) -> i64| counter_delta(f(cur), prior.map(f));
        let avg = |f: fn(&CpuAggregate) -> i64| {
            average_delta(cur.average(f(cur)), prior.map(|p| p.average(f(p))))
        };
        let per_sec = |d: i64| -> Result<i64, KarError> {
            Ok(round_half_up(rate_per_second(d, el, NANOS_PER_SEC)?))
        };
        let pct = |d: f64| -> Result<i64, KarError> {
            Ok(round_half_up(percentage_f64(d, el, NANOS_PER_SEC)?))
        };

        Ok(CpustatRow {
            timestamp: view.timestamp,
            load: load_averages(view),
            exec: rate_per_second(delta(|a| a.sysexec), el, NANOS_PER_SEC)?,
            intr: per_sec(delta(|a| a.intr))?,
            syscl: per_sec(delta(|a| a.syscall))?,
            csw: per_sec(delta(|a| a.csw))?,
            usr: pct(avg(|a| a.usr))?,
            sys: pct(avg(|a| a.sys))?,
            idl: pct(avg(|a| a.idl))?,
            midpoint: fmt::midpoint_secs(view.timestamp, el),
        })
    }

    fn render_table(&self, out: &mut dyn Write) -> io::Result<()> {
        for r in &self.rows {
            writeln!(out, "{}    cpu statistics", fmt::clock(r.timestamp))?;
            writeln!(out, "Load 1min   5min  15min   exec     in    sy    cs   us  sy  id")?;
            writeln!(
                out,
                "   {:6.2} {:6.2} {:6.2}   {:4.1}  {:5} {:5} {:5}  {:3} {:3} {:3}",
                r.load[0], r.load[1], r.load[2], r.exec, r.intr, r.syscl, r.csw, r.usr, r.sys, r.idl
            )?;
        }
        Ok(())
    }

    fn render_graphite(&self, out: &mut dyn Write) -> io::Result<()> {
        for r in &self.rows {
            let secs = r.midpoint;
            fmt::graphite_f64(out, "cpustat.load.1min", r.load[0], secs)?;
            fmt::graphite_f64(out, "cpustat.load.5min", r.load[1], secs)?;
            fmt::graphite_f64(out, "cpustat.load.15min", r.load[2], secs)?;
            fmt::graphite_f64(out, "cpustat.exec", r.exec, secs)?;
            fmt::graphite_i64(out, "cpustat.intr", r.intr, secs)?;
            fmt::graphite_i64(out, "cpustat.syscl", r.syscl, secs)?;
            fmt::graphite_i64(out, "cpustat.csw", r.csw, secs)?;
            fmt::graphite_i64(out, "cpustat.usr", r.usr, secs)?;
            fmt::graphite_i64(out, "cpustat.sys", r.sys, secs)?;
            fmt::graphite_i64(out, "cpustat.idl", r.idl, secs)?;
        }
        Ok(())
    }
}

impl CycleHandler for CpustatReport {
    fn accepts(&self, snapshot: &Snapshot) -> bool {
        is_cpu_sys(snapshot)
    }

    fn begin_cycle(&mut self, _view: &CycleView<'_>) {
        self.current = CpuAggregate::default();
    }

    fn on_restart(&mut self, _view: &CycleView<'_>) {
        self.prior = None;
    }

    fn on_snapshot(&mut self, _view: &CycleView<'_>, current: &Snapshot, _prior: Option<&Snapshot>) {
        self.current.add(current);
    }

    fn end_cycle(&mut self, view: &CycleView<'_>) {
        if self.current.count == 0 {
            debug!("cpustat: no cpu sets at {}", view.timestamp);
            return;
        }
        let skip = self.format == OutputFormat::Graphite
            && self.prior.is_none()
            && view.first
            && view.boot_millis() < view.window.midnight;
        if !skip {
            match self.compute(view) {
                Ok(row) => self.rows.push(row),
                Err(e) => debug!("cpustat: skipping {}: {}", view.timestamp, e),
            }
        }
        self.prior = Some(self.current);
    }
}

impl Report for CpustatReport {
    fn render(&self, out: &mut dyn Write) -> io::Result<()> {
        match self.format {
            OutputFormat::Table => self.render_table(out),
            OutputFormat::Graphite => self.render_graphite(out),
        }
    }
}
