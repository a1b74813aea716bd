use serde::{Deserialize, Serialize};

use crate::polls::{
    DATE_COLUMN, POLL_COLUMN, PollSource, PollTable, SAMPLE_COLUMN, in_counting_window,
    is_meta_row, parse_sample_size, parse_share_cell,
};
use crate::scorer::{IdeologyScore, Party, ScoreTable};

/// At most this many individual polls (plus one) feed a projection.
const MAX_POLLS_CONSIDERED: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub party: Party,
}

impl Candidate {
    pub fn new(name: impl Into<String>, party: Party) -> Self {
        Self {
            name: name.into(),
            party,
        }
    }

    /// Stand-in used when only the party matters.
    pub fn placeholder(party: Party) -> Self {
        Self::new("_", party)
    }
}

/// One seat (or block of electoral votes) and what the polls say about it.
///
/// An uncontested race is a certain hold for `incumbent`: share 1 and sample 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Race {
    pub code: String,
    pub turnout: u64,
    pub incumbent: Candidate,
    pub value: u32,
    contested: bool,
    incumbent_projected_vote_share: f64,
    sample_size: u64,
    pub incumbent_score: IdeologyScore,
    pub challenger_score: IdeologyScore,
    pub challenger_party: Party,
}

impl Race {
    pub fn new(
        code: impl Into<String>,
        turnout: u64,
        incumbent: Candidate,
        scorer: &ScoreTable,
        polls: &impl PollSource,
    ) -> Self {
        Self::with_value(code, turnout, incumbent, scorer, polls, 1)
    }

    pub fn with_value(
        code: impl Into<String>,
        turnout: u64,
        incumbent: Candidate,
        scorer: &ScoreTable,
        polls: &impl PollSource,
        value: u32,
    ) -> Self {
        let code = code.into();
        let challenger_party = incumbent.party.opponent();
        let mut race = Race {
            incumbent_score: scorer.get_score(&incumbent.name, incumbent.party, &code),
            challenger_score: scorer.fallback_score(challenger_party, &code),
            challenger_party,
            code,
            turnout,
            incumbent,
            value,
            contested: false,
            incumbent_projected_vote_share: 1.0,
            sample_size: 0,
        };

        if let Some(table) = polls.find_poll(&race.code) {
            race.contested = true;
            race.update_margin_and_scores(table, scorer);
        }
        race
    }

    fn update_margin_and_scores(&mut self, table: &PollTable, scorer: &ScoreTable) {
        let candidates = table.candidate_columns();
        let incumbent_party = self.incumbent.party;

        let mut incumbent_found = false;
        let mut challenger_found = false;
        for column in &candidates {
            if !challenger_found && column.party != incumbent_party {
                self.challenger_score = scorer.get_score(&column.name, column.party, &self.code);
                self.challenger_party = column.party;
                challenger_found = true;
            }
            if !incumbent_found && column.party == incumbent_party {
                self.incumbent = Candidate::new(column.name.clone(), column.party);
                self.incumbent_score = scorer.get_score(&column.name, column.party, &self.code);
                incumbent_found = true;
            }
        }
        if !incumbent_found {
            self.incumbent_score =
                scorer.get_score(&self.incumbent.name, self.incumbent.party, &self.code);
        }
        if !challenger_found {
            self.challenger_score = scorer.fallback_score(self.challenger_party, &self.code);
        }

        let poll_col = table.column(POLL_COLUMN);
        let date_col = table.column(DATE_COLUMN);
        let sample_col = table.column(SAMPLE_COLUMN);

        let mut total_margin = 0.0;
        let mut rows_considered = 0usize;
        for row in &table.rows {
            if is_meta_row(table.cell(row, poll_col)) {
                continue;
            }
            if rows_considered > MAX_POLLS_CONSIDERED
                || !in_counting_window(table.cell(row, date_col))
            {
                break;
            }
            rows_considered += 1;

            let sample_size = parse_sample_size(table.cell(row, sample_col));
            let margin: f64 = candidates
                .iter()
                .filter_map(|column| {
                    let share = parse_share_cell(table.cell(row, Some(column.index)))?;
                    Some(if column.party == incumbent_party {
                        share
                    } else {
                        -share
                    })
                })
                .sum();
            self.sample_size += sample_size;
            total_margin += margin * sample_size as f64;
        }

        if self.sample_size == 0 {
            tracing::debug!(code = %self.code, "no polls inside the counting window; race left uncontested");
            self.contested = false;
        } else {
            // Margin is in percentage points; half of it moves the share off 50%.
            self.incumbent_projected_vote_share =
                0.5 + (total_margin / self.sample_size as f64) / 200.0;
            tracing::debug!(
                code = %self.code,
                polls = rows_considered,
                sample_size = self.sample_size,
                share = self.incumbent_projected_vote_share,
                "projected race from polls"
            );
        }
    }

    pub fn incumbent_party(&self) -> Party {
        self.incumbent.party
    }

    pub fn contested(&self) -> bool {
        self.contested
    }

    pub fn incumbent_projected_vote_share(&self) -> f64 {
        self.incumbent_projected_vote_share
    }

    pub fn sample_size(&self) -> u64 {
        self.sample_size
    }

    /// Sets the projection from an outside estimate. A zero sample leaves the race
    /// uncontested: share 1, sample 0.
    pub fn project(&mut self, share: f64, sample_size: u64) {
        if sample_size == 0 {
            self.contested = false;
            self.incumbent_projected_vote_share = 1.0;
            self.sample_size = 0;
        } else {
            self.contested = true;
            self.incumbent_projected_vote_share = share;
            self.sample_size = sample_size;
        }
    }

    /// Builder form of [`Race::project`].
    pub fn projected(mut self, share: f64, sample_size: u64) -> Self {
        self.project(share, sample_size);
        self
    }
}
