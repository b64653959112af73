use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::store::{Ballot, VoteRow, TIME_FORMAT};
use crate::tally::Window;

pub fn render_results_table(rows: &[VoteRow], best: Option<&Window>) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Start Time", "Votes"]);

    for row in rows {
        let label = row.start_time.format(TIME_FORMAT).to_string();
        let time_cell = if best.is_some_and(|w| w.start == row.start_time) {
            Cell::new(label).fg(Color::Green)
        } else {
            Cell::new(label)
        };
        table.add_row(Row::from(vec![time_cell, Cell::new(row.votes)]));
    }
    table.to_string()
}

pub fn render_ballots_table(entries: &[Ballot]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Voted At", "Player"]);
    for entry in entries {
        table.add_row(vec![
            entry.voted_at.format(TIME_FORMAT).to_string(),
            entry.player.clone(),
        ]);
    }
    table.to_string()
}
