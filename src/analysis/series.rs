//! Chart-ready views of aggregation results.

use tracing::debug;

use super::bundle::{PairSpec, SeriesBasis};
use super::ranker::rank_insight;
use crate::errors::{AggregateError, AggregateResult};
use crate::models::{
    CrossTable, FrequencyTable, GroupRow, InsightBundle, KeyInsight, SeriesEntry,
};

/// Sum each inner value across every group.
pub fn pooled_totals(cross: &CrossTable) -> FrequencyTable {
    cross
        .iter()
        .flat_map(|(_, table)| table.iter())
        .fold(FrequencyTable::new(), |mut pooled, (key, count)| {
            pooled.add(key, count);
            pooled
        })
}

/// One entry per group holding the sum of its inner counts.
pub fn row_totals(cross: &CrossTable) -> FrequencyTable {
    let mut totals = FrequencyTable::new();
    for (group, table) in cross.iter() {
        totals.add(group, table.total());
    }
    totals
}

/// Series for a cross table under the given basis.
pub fn series_for(cross: &CrossTable, basis: SeriesBasis) -> Vec<SeriesEntry> {
    match basis {
        SeriesBasis::Pooled => pooled_totals(cross).to_series(),
        SeriesBasis::RowTotals => row_totals(cross).to_series(),
    }
}

/// Pivot a composite-key table back into rows.
///
/// `"BARINGO - LEVEL 2": 24` becomes row `BARINGO` with column
/// `LEVEL 2 = 24`. Keys split on the first delimiter occurrence.
pub fn split_composite(table: &FrequencyTable, delimiter: &str) -> AggregateResult<Vec<GroupRow>> {
    if delimiter.is_empty() {
        return Err(AggregateError::EmptyDelimiter);
    }

    let mut pivot = CrossTable::new();

    for (key, count) in table.iter() {
        let (left, right) = match key.split_once(delimiter) {
            Some(parts) => parts,
            None => {
                return Err(AggregateError::MalformedCompositeKey {
                    key: key.to_string(),
                    delimiter: delimiter.to_string(),
                })
            }
        };
        pivot.group_mut(left).add(right, count);
    }

    Ok(pivot.to_rows())
}

/// Rank the key insight of every pair that declares one.
///
/// Pairs whose slot is absent from the bundle are skipped. An empty series
/// yields a panel without a ranking, for the "no data yet" case.
pub fn key_insights(bundle: &InsightBundle, pairs: &[PairSpec]) -> AggregateResult<Vec<KeyInsight>> {
    let mut insights = Vec::new();

    for pair in pairs {
        let Some(spec) = &pair.insight else {
            continue;
        };
        let Some(cross) = bundle.get(&pair.name) else {
            debug!("No bundle slot for insight pair '{}'", pair.name);
            continue;
        };

        let series = series_for(cross, spec.basis);
        let ranked = match rank_insight(&series, spec.category) {
            Ok(ranked) => Some(ranked),
            Err(AggregateError::EmptyInput) => None,
            Err(e) => return Err(e),
        };

        insights.push(KeyInsight {
            category: spec.category,
            title: spec.category.title().to_string(),
            source: pair.name.clone(),
            series,
            ranked,
        });
    }

    Ok(insights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregator::{cross_tabulate, tabulate_composite, DEFAULT_DELIMITER};
    use crate::analysis::bundle::build_insight_bundle;
    use crate::models::{InsightCategory, Record};

    fn security_table() -> CrossTable {
        let records = vec![
            Record::new()
                .with("solution", "EMR System")
                .with("concerns", vec!["Data Breach", "Unauthorized Access"]),
            Record::new()
                .with("solution", "Hybrid")
                .with("concerns", vec!["Data Breach", "Data Loss"]),
            Record::new()
                .with("solution", "Hybrid")
                .with("concerns", vec!["Unauthorized Access", "Data Breach"]),
        ];
        cross_tabulate(&records, "solution", "concerns").unwrap()
    }

    #[test]
    fn test_pooled_totals() {
        let pooled = pooled_totals(&security_table());
        let expected: FrequencyTable =
            [("Data Breach", 3), ("Unauthorized Access", 2), ("Data Loss", 1)]
                .into_iter()
                .collect();
        assert_eq!(pooled, expected);
        assert_eq!(pooled.iter().next(), Some(("Data Breach", 3)));
    }

    #[test]
    fn test_row_totals() {
        let totals = row_totals(&security_table());
        let expected: FrequencyTable = [("EMR System", 2), ("Hybrid", 4)].into_iter().collect();
        assert_eq!(totals, expected);
    }

    #[test]
    fn test_split_composite() {
        let records = vec![
            Record::new().with("County", "BARINGO").with("Level", "LEVEL 2"),
            Record::new().with("County", "BARINGO").with("Level", "LEVEL 2"),
            Record::new().with("County", "BARINGO").with("Level", "LEVEL 4"),
            Record::new().with("County", "BOMET").with("Level", "LEVEL 2"),
        ];
        let table = tabulate_composite(&records, "County", "Level", DEFAULT_DELIMITER).unwrap();

        let rows = split_composite(&table, DEFAULT_DELIMITER).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].group, "BARINGO");
        assert_eq!(rows[0].count("LEVEL 2"), Some(2));
        assert_eq!(rows[0].count("LEVEL 4"), Some(1));
        assert_eq!(rows[1].group, "BOMET");
        assert_eq!(rows[1].count("LEVEL 4"), None);
    }

    #[test]
    fn test_split_composite_malformed_key() {
        let table: FrequencyTable = [("NO DELIMITER", 1)].into_iter().collect();
        let err = split_composite(&table, DEFAULT_DELIMITER).unwrap_err();
        assert!(matches!(err, AggregateError::MalformedCompositeKey { .. }));

        let table: FrequencyTable = [("abc", 2)].into_iter().collect();
        assert_eq!(split_composite(&table, "").unwrap_err(), AggregateError::EmptyDelimiter);
    }

    #[test]
    fn test_key_insights_from_survey_defaults() {
        let records = vec![
            Record::new()
                .with("currentSolutions", "Hybrid")
                .with("existingGaps", vec!["Slow retrieval"])
                .with("desiredEfficiencies", vec!["Faster Retrieval", "Real-time Access"])
                .with("willingnessToPayNow", "Monthly")
                .with("dataSecurityConcerns", vec!["Data Breach"]),
            Record::new()
                .with("currentSolutions", "Hybrid")
                .with("existingGaps", vec!["Lost files"])
                .with("desiredEfficiencies", vec!["Faster Retrieval"])
                .with("willingnessToPayNow", "Monthly")
                .with("dataSecurityConcerns", vec!["Data Breach", "Data Loss"]),
            Record::new()
                .with("currentSolutions", "Paper Only")
                .with("existingGaps", vec!["Lost files"])
                .with("desiredEfficiencies", vec!["Scalable System"])
                .with("willingnessToPayNow", "Annual")
                .with("dataSecurityConcerns", vec!["Data Loss"]),
        ];
        let pairs = PairSpec::survey_defaults();
        let bundle = build_insight_bundle(&records, &pairs).unwrap();

        let insights = key_insights(&bundle, &pairs).unwrap();
        let categories: Vec<_> = insights.iter().map(|i| i.category).collect();
        assert_eq!(
            categories,
            vec![
                InsightCategory::Security,
                InsightCategory::Payment,
                InsightCategory::Efficiency,
            ]
        );

        let security = insights[0].ranked.as_ref().unwrap();
        assert_eq!(security.total_value, 4);
        assert_eq!(security.share_percent, 50.0);

        let payment = insights[1].ranked.as_ref().unwrap();
        assert_eq!(payment.top_name, "Monthly");
        assert_eq!(payment.share_percent, 66.7);

        let efficiency = insights[2].ranked.as_ref().unwrap();
        assert_eq!(efficiency.top_name, "Hybrid");
        assert_eq!(efficiency.top_value, 3);
        assert!(efficiency.narrative.contains("score of 3"));
    }

    #[test]
    fn test_key_insights_empty_bundle_has_no_ranking() {
        let records: Vec<Record> = Vec::new();
        let pairs = PairSpec::survey_defaults();
        let bundle = build_insight_bundle(&records, &pairs).unwrap();

        let insights = key_insights(&bundle, &pairs).unwrap();
        assert_eq!(insights.len(), 3);
        assert!(insights.iter().all(|i| i.ranked.is_none() && i.series.is_empty()));
    }
}
