use super::types::{ChartValues, MonthRecord, YearPoint};

/// Downsamples a monthly schedule to one point per year, always keeping the
/// final month so the chart ends where the schedule does.
pub fn yearly_points(schedule: &[MonthRecord]) -> Vec<YearPoint> {
    let last_index = schedule.len().saturating_sub(1);
    schedule
        .iter()
        .enumerate()
        .filter(|(index, _)| index % 12 == 0 || *index == last_index)
        .map(|(_, record)| YearPoint {
            label: format!("Y{}", record.month / 12),
            month: record.month,
            nominal: ChartValues::from(&record.nominal),
            real: ChartValues::from(&record.real),
        })
        .collect()
}
