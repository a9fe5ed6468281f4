use std::collections::HashMap;

use crate::models::enums::LabAnalyte;
use crate::models::{
    CytologyFeatures, CytologyResult, Episode, EpisodeEventLink, EpisodeFeatures,
    ImagingFeatures, ImagingFinding, LabFeatures, LabResult, MolecularFeatures, MolecularResult,
};

use super::types::EventSnapshot;

/// Anti-Tg antibody titers above this level are treated as positive.
const ANTI_TG_POSITIVE_THRESHOLD: f64 = 0.9;

/// Aggregate every episode's assigned events into one feature record.
///
/// Per modality: filter the episode's links to the modality's event types,
/// join the attribute side table on `event_id` (inner join; an event with
/// no attribute row contributes nothing), and aggregate. Groups are sorted
/// by `(event_date, event_id)` ascending before aggregation; the "latest"
/// aggregations depend on that order.
///
/// An episode with no assigned events of a modality gets `None` for the
/// whole modality block, never zero/false defaults.
pub fn aggregate_features(
    episodes: &[Episode],
    links: &[EpisodeEventLink],
    snapshot: &EventSnapshot,
) -> Vec<EpisodeFeatures> {
    let mut by_episode: HashMap<&str, Vec<&EpisodeEventLink>> = HashMap::new();
    for link in links {
        by_episode
            .entry(link.episode_id.as_str())
            .or_default()
            .push(link);
    }
    for group in by_episode.values_mut() {
        group.sort_by_key(|l| (l.event_date, l.event_id));
    }

    episodes
        .iter()
        .map(|episode| {
            let group: &[&EpisodeEventLink] = by_episode
                .get(episode.episode_id.as_str())
                .map(|g| g.as_slice())
                .unwrap_or(&[]);
            EpisodeFeatures {
                episode_id: episode.episode_id.clone(),
                patient_id: episode.patient_id.clone(),
                index_event_type: episode.index_event_type,
                index_event_date: episode.index_event_date,
                imaging: imaging_features(group, snapshot),
                cytology: cytology_features(group, snapshot),
                molecular: molecular_features(group, snapshot),
                labs: lab_features(group, snapshot),
            }
        })
        .collect()
}

fn imaging_features(
    links: &[&EpisodeEventLink],
    snapshot: &EventSnapshot,
) -> Option<ImagingFeatures> {
    let rows: Vec<&ImagingFinding> = links
        .iter()
        .filter(|l| l.event_type.is_imaging())
        .filter_map(|l| snapshot.imaging_for(l.event_id))
        .collect();
    if rows.is_empty() {
        return None;
    }
    Some(ImagingFeatures {
        tirads_max: rows.iter().filter_map(|r| r.tirads).max(),
        nodule_count_total: sum_u32(rows.iter().filter_map(|r| r.nodule_count)),
        max_nodule_size_cm: max_f64(rows.iter().filter_map(|r| r.max_nodule_size_cm)),
        thyroid_volume_latest_ml: last_present(rows.iter().map(|r| r.thyroid_volume_ml)),
        suspicious_features_total: sum_u32(rows.iter().filter_map(|r| r.suspicious_features)),
    })
}

fn cytology_features(
    links: &[&EpisodeEventLink],
    snapshot: &EventSnapshot,
) -> Option<CytologyFeatures> {
    let rows: Vec<&CytologyResult> = links
        .iter()
        .filter(|l| l.event_type.is_cytology())
        .filter_map(|l| snapshot.cytology_for(l.event_id))
        .collect();
    if rows.is_empty() {
        return None;
    }
    Some(CytologyFeatures {
        bethesda_max: rows.iter().filter_map(|r| r.bethesda).max(),
        bethesda_latest: last_present(rows.iter().map(|r| r.bethesda)),
        fna_count: rows.len() as u32,
        adequacy_latest: last_present(rows.iter().map(|r| r.adequacy)),
    })
}

fn molecular_features(
    links: &[&EpisodeEventLink],
    snapshot: &EventSnapshot,
) -> Option<MolecularFeatures> {
    let rows: Vec<&MolecularResult> = links
        .iter()
        .filter(|l| l.event_type.is_molecular())
        .filter_map(|l| snapshot.molecular_for(l.event_id))
        .collect();
    if rows.is_empty() {
        return None;
    }
    Some(MolecularFeatures {
        braf_positive: rows.iter().any(|r| r.braf),
        ras_positive: rows.iter().any(|r| r.ras),
        ret_ptc_positive: rows.iter().any(|r| r.ret_ptc),
        classifier_score_latest: last_present(rows.iter().map(|r| r.classifier_score)),
    })
}

fn lab_features(links: &[&EpisodeEventLink], snapshot: &EventSnapshot) -> Option<LabFeatures> {
    let rows: Vec<&LabResult> = links
        .iter()
        .filter(|l| l.event_type.is_lab())
        .filter_map(|l| snapshot.labs_for(l.event_id))
        .collect();
    if rows.is_empty() {
        return None;
    }

    let values = |analyte: LabAnalyte| -> Vec<f64> {
        rows.iter()
            .filter(|r| r.analyte == analyte)
            .filter_map(|r| r.value)
            .collect()
    };
    let latest = |analyte: LabAnalyte| -> Option<f64> {
        last_present(rows.iter().filter(|r| r.analyte == analyte).map(|r| r.value))
    };

    let tg = values(LabAnalyte::Thyroglobulin);
    let anti_tg_max = max_f64(values(LabAnalyte::AntiTg).into_iter());

    Some(LabFeatures {
        thyroglobulin_mean: mean_f64(&tg),
        thyroglobulin_max: max_f64(tg.iter().copied()),
        tsh_latest: latest(LabAnalyte::Tsh),
        t3_latest: latest(LabAnalyte::T3),
        t4_latest: latest(LabAnalyte::T4),
        anti_tg_max,
        anti_tg_positive: anti_tg_max.map(|v| v > ANTI_TG_POSITIVE_THRESHOLD),
    })
}

fn sum_u32(values: impl Iterator<Item = u32>) -> Option<u32> {
    let mut any = false;
    let mut total: u32 = 0;
    for v in values {
        any = true;
        total += v;
    }
    any.then_some(total)
}

fn max_f64(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc, v| match acc {
        Some(a) => Some(a.max(v)),
        None => Some(v),
    })
}

fn mean_f64(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Latest non-missing value of a date-ascending sequence.
fn last_present<T>(values: impl DoubleEndedIterator<Item = Option<T>>) -> Option<T> {
    values.rev().flatten().next()
}
