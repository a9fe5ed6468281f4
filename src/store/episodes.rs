use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, Transaction};
use uuid::Uuid;

use crate::fusion::FusionOutcome;
use crate::models::enums::{EventType, SpecimenAdequacy, SurgeryRelationship, SurgeryType};
use crate::models::{
    CytologyFeatures, Episode, EpisodeEventLink, EpisodeFeatures, EpisodeSurgeryLink,
    ImagingFeatures, LabFeatures, MolecularFeatures,
};

use super::StoreError;

/// Persist a whole run in one transaction. Existing rows from a previous
/// run are replaced; outputs are recomputed-per-run artifacts, not a live
/// store.
pub fn persist_outcome(conn: &mut Connection, outcome: &FusionOutcome) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    clear_run(&tx)?;
    for episode in &outcome.episodes {
        insert_episode(&tx, episode)?;
    }
    for link in &outcome.event_links {
        insert_event_link(&tx, link)?;
    }
    if let Some(surgery_links) = &outcome.surgery_links {
        for link in surgery_links {
            insert_surgery_link(&tx, link)?;
        }
    }
    for features in &outcome.features {
        insert_features(&tx, features)?;
    }
    tx.commit()?;
    Ok(())
}

fn clear_run(tx: &Transaction) -> Result<(), StoreError> {
    tx.execute("DELETE FROM episode_features", [])?;
    tx.execute("DELETE FROM episode_surgery_links", [])?;
    tx.execute("DELETE FROM episode_events", [])?;
    tx.execute("DELETE FROM diagnostic_episodes", [])?;
    Ok(())
}

pub fn insert_episode(conn: &Connection, episode: &Episode) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO diagnostic_episodes (episode_id, patient_id, index_event_type,
         index_event_date, index_event_id, priority_rank)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            episode.episode_id,
            episode.patient_id,
            episode.index_event_type.as_str(),
            episode.index_event_date.to_string(),
            episode.index_event_id.to_string(),
            episode.priority_rank as i64,
        ],
    )?;
    Ok(())
}

pub fn insert_event_link(conn: &Connection, link: &EpisodeEventLink) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO episode_events (event_id, episode_id, event_type, event_date,
         delta_days, within_window)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            link.event_id.to_string(),
            link.episode_id,
            link.event_type.as_str(),
            link.event_date.to_string(),
            link.delta_days,
            link.within_window,
        ],
    )?;
    Ok(())
}

pub fn insert_surgery_link(
    conn: &Connection,
    link: &EpisodeSurgeryLink,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO episode_surgery_links (episode_id, surgery_id, surgery_date,
         surgery_type, relationship, days_to_surgery)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            link.episode_id,
            link.surgery_id.map(|id| id.to_string()),
            link.surgery_date.map(|d| d.to_string()),
            link.surgery_type.map(|t| t.as_str()),
            link.relationship.as_str(),
            link.days_to_surgery,
        ],
    )?;
    Ok(())
}

pub fn insert_features(conn: &Connection, features: &EpisodeFeatures) -> Result<(), StoreError> {
    let imaging = features.imaging.as_ref();
    let cytology = features.cytology.as_ref();
    let molecular = features.molecular.as_ref();
    let labs = features.labs.as_ref();
    conn.execute(
        "INSERT INTO episode_features (episode_id, patient_id, index_event_type,
         index_event_date, tirads_max, nodule_count_total, max_nodule_size_cm,
         thyroid_volume_latest_ml, suspicious_features_total, bethesda_max,
         bethesda_latest, fna_count, adequacy_latest, braf_positive, ras_positive,
         ret_ptc_positive, classifier_score_latest, thyroglobulin_mean,
         thyroglobulin_max, tsh_latest, t3_latest, t4_latest, anti_tg_max,
         anti_tg_positive)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                 ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
        params![
            features.episode_id,
            features.patient_id,
            features.index_event_type.as_str(),
            features.index_event_date.to_string(),
            imaging.and_then(|f| f.tirads_max),
            imaging.and_then(|f| f.nodule_count_total),
            imaging.and_then(|f| f.max_nodule_size_cm),
            imaging.and_then(|f| f.thyroid_volume_latest_ml),
            imaging.and_then(|f| f.suspicious_features_total),
            cytology.and_then(|f| f.bethesda_max),
            cytology.and_then(|f| f.bethesda_latest),
            cytology.map(|f| f.fna_count),
            cytology.and_then(|f| f.adequacy_latest.map(|a| a.as_str())),
            molecular.map(|f| f.braf_positive),
            molecular.map(|f| f.ras_positive),
            molecular.map(|f| f.ret_ptc_positive),
            molecular.and_then(|f| f.classifier_score_latest),
            labs.and_then(|f| f.thyroglobulin_mean),
            labs.and_then(|f| f.thyroglobulin_max),
            labs.and_then(|f| f.tsh_latest),
            labs.and_then(|f| f.t3_latest),
            labs.and_then(|f| f.t4_latest),
            labs.and_then(|f| f.anti_tg_max),
            labs.and_then(|f| f.anti_tg_positive),
        ],
    )?;
    Ok(())
}

pub fn fetch_episodes(conn: &Connection) -> Result<Vec<Episode>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT episode_id, patient_id, index_event_type, index_event_date,
         index_event_id, priority_rank
         FROM diagnostic_episodes ORDER BY episode_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, i64>(5)?,
        ))
    })?;

    let mut episodes = Vec::new();
    for row in rows {
        let (episode_id, patient_id, event_type, date, event_id, rank) = row?;
        episodes.push(Episode {
            episode_id,
            patient_id,
            index_event_type: EventType::from_str(&event_type)?,
            index_event_date: parse_date(&date)?,
            index_event_id: parse_uuid(&event_id)?,
            priority_rank: rank as usize,
        });
    }
    Ok(episodes)
}

pub fn fetch_event_links(conn: &Connection) -> Result<Vec<EpisodeEventLink>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT episode_id, event_id, event_type, event_date, delta_days, within_window
         FROM episode_events ORDER BY episode_id, event_date, event_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, bool>(5)?,
        ))
    })?;

    let mut links = Vec::new();
    for row in rows {
        let (episode_id, event_id, event_type, date, delta_days, within_window) = row?;
        links.push(EpisodeEventLink {
            episode_id,
            event_id: parse_uuid(&event_id)?,
            event_type: EventType::from_str(&event_type)?,
            event_date: parse_date(&date)?,
            delta_days,
            within_window,
        });
    }
    Ok(links)
}

pub fn fetch_surgery_links(conn: &Connection) -> Result<Vec<EpisodeSurgeryLink>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT episode_id, surgery_id, surgery_date, surgery_type, relationship,
         days_to_surgery
         FROM episode_surgery_links ORDER BY episode_id, surgery_date, surgery_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<i64>>(5)?,
        ))
    })?;

    let mut links = Vec::new();
    for row in rows {
        let (episode_id, surgery_id, surgery_date, surgery_type, relationship, days) = row?;
        links.push(EpisodeSurgeryLink {
            episode_id,
            surgery_id: surgery_id.as_deref().map(parse_uuid).transpose()?,
            surgery_date: surgery_date.as_deref().map(parse_date).transpose()?,
            surgery_type: surgery_type
                .as_deref()
                .map(SurgeryType::from_str)
                .transpose()?,
            relationship: SurgeryRelationship::from_str(&relationship)?,
            days_to_surgery: days,
        });
    }
    Ok(links)
}

// Internal row type for EpisodeFeatures mapping
struct FeatureRow {
    episode_id: String,
    patient_id: String,
    index_event_type: String,
    index_event_date: String,
    tirads_max: Option<u8>,
    nodule_count_total: Option<u32>,
    max_nodule_size_cm: Option<f64>,
    thyroid_volume_latest_ml: Option<f64>,
    suspicious_features_total: Option<u32>,
    bethesda_max: Option<u8>,
    bethesda_latest: Option<u8>,
    fna_count: Option<u32>,
    adequacy_latest: Option<String>,
    braf_positive: Option<bool>,
    ras_positive: Option<bool>,
    ret_ptc_positive: Option<bool>,
    classifier_score_latest: Option<f64>,
    thyroglobulin_mean: Option<f64>,
    thyroglobulin_max: Option<f64>,
    tsh_latest: Option<f64>,
    t3_latest: Option<f64>,
    t4_latest: Option<f64>,
    anti_tg_max: Option<f64>,
    anti_tg_positive: Option<bool>,
}

/// A modality block whose every stored column is NULL reloads as absent.
pub fn fetch_features(conn: &Connection) -> Result<Vec<EpisodeFeatures>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT episode_id, patient_id, index_event_type, index_event_date,
         tirads_max, nodule_count_total, max_nodule_size_cm, thyroid_volume_latest_ml,
         suspicious_features_total, bethesda_max, bethesda_latest, fna_count,
         adequacy_latest, braf_positive, ras_positive, ret_ptc_positive,
         classifier_score_latest, thyroglobulin_mean, thyroglobulin_max, tsh_latest,
         t3_latest, t4_latest, anti_tg_max, anti_tg_positive
         FROM episode_features ORDER BY episode_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(FeatureRow {
            episode_id: row.get(0)?,
            patient_id: row.get(1)?,
            index_event_type: row.get(2)?,
            index_event_date: row.get(3)?,
            tirads_max: row.get(4)?,
            nodule_count_total: row.get(5)?,
            max_nodule_size_cm: row.get(6)?,
            thyroid_volume_latest_ml: row.get(7)?,
            suspicious_features_total: row.get(8)?,
            bethesda_max: row.get(9)?,
            bethesda_latest: row.get(10)?,
            fna_count: row.get(11)?,
            adequacy_latest: row.get(12)?,
            braf_positive: row.get(13)?,
            ras_positive: row.get(14)?,
            ret_ptc_positive: row.get(15)?,
            classifier_score_latest: row.get(16)?,
            thyroglobulin_mean: row.get(17)?,
            thyroglobulin_max: row.get(18)?,
            tsh_latest: row.get(19)?,
            t3_latest: row.get(20)?,
            t4_latest: row.get(21)?,
            anti_tg_max: row.get(22)?,
            anti_tg_positive: row.get(23)?,
        })
    })?;

    let mut features = Vec::new();
    for row in rows {
        features.push(features_from_row(row?)?);
    }
    Ok(features)
}

fn features_from_row(row: FeatureRow) -> Result<EpisodeFeatures, StoreError> {
    let imaging = if row.tirads_max.is_some()
        || row.nodule_count_total.is_some()
        || row.max_nodule_size_cm.is_some()
        || row.thyroid_volume_latest_ml.is_some()
        || row.suspicious_features_total.is_some()
    {
        Some(ImagingFeatures {
            tirads_max: row.tirads_max,
            nodule_count_total: row.nodule_count_total,
            max_nodule_size_cm: row.max_nodule_size_cm,
            thyroid_volume_latest_ml: row.thyroid_volume_latest_ml,
            suspicious_features_total: row.suspicious_features_total,
        })
    } else {
        None
    };

    // fna_count is written whenever the cytology block exists.
    let cytology = row
        .fna_count
        .map(|fna_count| -> Result<CytologyFeatures, StoreError> {
            Ok(CytologyFeatures {
                bethesda_max: row.bethesda_max,
                bethesda_latest: row.bethesda_latest,
                fna_count,
                adequacy_latest: row
                    .adequacy_latest
                    .as_deref()
                    .map(SpecimenAdequacy::from_str)
                    .transpose()?,
            })
        })
        .transpose()?;

    // The mutation flags are written whenever the molecular block exists.
    let molecular = row.braf_positive.map(|braf_positive| MolecularFeatures {
        braf_positive,
        ras_positive: row.ras_positive.unwrap_or(false),
        ret_ptc_positive: row.ret_ptc_positive.unwrap_or(false),
        classifier_score_latest: row.classifier_score_latest,
    });

    let labs = if row.thyroglobulin_mean.is_some()
        || row.thyroglobulin_max.is_some()
        || row.tsh_latest.is_some()
        || row.t3_latest.is_some()
        || row.t4_latest.is_some()
        || row.anti_tg_max.is_some()
        || row.anti_tg_positive.is_some()
    {
        Some(LabFeatures {
            thyroglobulin_mean: row.thyroglobulin_mean,
            thyroglobulin_max: row.thyroglobulin_max,
            tsh_latest: row.tsh_latest,
            t3_latest: row.t3_latest,
            t4_latest: row.t4_latest,
            anti_tg_max: row.anti_tg_max,
            anti_tg_positive: row.anti_tg_positive,
        })
    } else {
        None
    };

    Ok(EpisodeFeatures {
        episode_id: row.episode_id,
        patient_id: row.patient_id,
        index_event_type: EventType::from_str(&row.index_event_type)?,
        index_event_date: parse_date(&row.index_event_date)?,
        imaging,
        cytology,
        molecular,
        labs,
    })
}

fn parse_date(s: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::from_str(s).map_err(|_| StoreError::InvalidDate(s.to_string()))
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|_| StoreError::InvalidUuid(s.to_string()))
}
