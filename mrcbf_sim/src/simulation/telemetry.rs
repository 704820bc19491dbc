// mrcbf_sim/src/simulation/telemetry.rs

use std::io;

use mrcbf_core::control::telemetry::DebugLog;
use mrcbf_core::frames::StateVariable;

/// Writes a controller log as CSV, one record per controller update.
///
/// Columns: `time`, the state labelled by `layout` (`px`..`wz` for the
/// quadrotor), the reference (`ref_px`..`ref_wz`), `u0..u3`, then
/// `slow0..slow3` and `fast0..fast3` when any entry carries them (empty fields
/// otherwise). States that do not match the layout get `x0, x1, ...`.
/// An empty log writes nothing.
pub fn write_log<W: io::Write>(
    log: &DebugLog,
    layout: &[StateVariable],
    mut wtr: csv::Writer<W>,
) -> Result<(), csv::Error> {
    let Some(first) = log.entries().first() else {
        return Ok(());
    };
    let state_dim = first.true_state.len();
    let input_dim = first.input.len();
    let staged = log
        .entries()
        .iter()
        .any(|e| e.input_slow.is_some() || e.input_fast.is_some());

    let state_labels: Vec<String> = if state_dim == layout.len() {
        layout.iter().map(|v| v.label().to_string()).collect()
    } else {
        (0..state_dim).map(|i| format!("x{i}")).collect()
    };

    let mut header = vec!["time".to_string()];
    header.extend(state_labels.iter().cloned());
    header.extend(state_labels.iter().map(|l| format!("ref_{l}")));
    header.extend((0..input_dim).map(|i| format!("u{i}")));
    if staged {
        header.extend((0..input_dim).map(|i| format!("slow{i}")));
        header.extend((0..input_dim).map(|i| format!("fast{i}")));
    }
    wtr.write_record(&header)?;

    for entry in log.entries() {
        let mut row = vec![entry.time.to_string()];
        row.extend(entry.true_state.iter().map(f64::to_string));
        row.extend(entry.ref_state.iter().map(f64::to_string));
        row.extend(entry.input.iter().map(f64::to_string));
        if staged {
            for stage in [&entry.input_slow, &entry.input_fast] {
                match stage {
                    Some(u) => row.extend(u.iter().map(f64::to_string)),
                    None => row.extend(std::iter::repeat(String::new()).take(input_dim)),
                }
            }
        }
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrcbf_core::control::telemetry::DebugEntry;
    use mrcbf_core::frames::layout::quadrotor_state_layout;
    use nalgebra::DVector;

    fn entry(time: f64, staged: bool) -> DebugEntry {
        DebugEntry {
            time,
            true_state: DVector::from_element(12, time),
            ref_state: DVector::zeros(12),
            input: DVector::from_element(4, 2.0),
            input_slow: staged.then(|| DVector::from_element(4, 2.5)),
            input_fast: staged.then(|| DVector::from_element(4, -0.5)),
        }
    }

    fn to_csv(log: &DebugLog) -> String {
        let mut buffer = Vec::new();
        write_log(log, &quadrotor_state_layout(), csv::Writer::from_writer(&mut buffer)).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn csv_has_header_and_one_record_per_update() {
        let mut log = DebugLog::new();
        log.push(entry(0.0, true));
        log.push(entry(0.5, true));

        let text = to_csv(&log);
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let header = reader.headers().unwrap().clone();
        assert_eq!(header.len(), 1 + 12 + 12 + 4 + 4 + 4);
        assert_eq!(&header[0], "time");
        assert_eq!(&header[1], "px");
        assert_eq!(&header[16], "ref_roll");
        assert_eq!(&header[33], "fast0");

        let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[1][0], "0.5");
        assert_eq!(&records[1][1], "0.5");
        assert_eq!(&records[0][33], "-0.5");
    }

    #[test]
    fn single_stage_log_omits_stage_columns() {
        let mut log = DebugLog::new();
        log.push(entry(0.0, false));

        let text = to_csv(&log);
        let first_line = text.lines().next().unwrap();
        assert_eq!(first_line.split(',').count(), 1 + 12 + 12 + 4);
    }

    #[test]
    fn unknown_state_length_gets_numbered_columns() {
        let mut log = DebugLog::new();
        let mut short = entry(0.0, false);
        short.true_state = DVector::zeros(3);
        short.ref_state = DVector::zeros(3);
        log.push(short);

        let text = to_csv(&log);
        let header: Vec<&str> = text.lines().next().unwrap().split(',').collect();
        assert_eq!(&header[..5], &["time", "x0", "x1", "x2", "ref_x0"]);
    }

    #[test]
    fn empty_log_writes_nothing() {
        assert!(to_csv(&DebugLog::new()).is_empty());
    }
}
