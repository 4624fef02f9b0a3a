//! Plain-text clinical report and treatment suggestions.

use crate::types::{AnalysisResult, Measurements};
use chrono::NaiveDateTime;
use std::fmt::Write;

const RULE_WIDTH: usize = 63;
const REPORT_VERSION: &str = "1.0";

const MAINTENANCE: &str =
    "→ Maintenance: Continue existing treatment plan. Periodic DSD monitoring recommended.";

/// Harmony grade label used in the report header.
pub fn harmony_grade(harmony: u8) -> &'static str {
    if harmony >= 85 {
        "✓ EXCELLENT"
    } else if harmony >= 70 {
        "△ ACCEPTABLE"
    } else {
        "⚠ REQUIRES ATTENTION"
    }
}

/// Discipline-level treatment suggestions; a single maintenance line when none apply.
pub fn treatment_suggestions(m: &Measurements) -> Vec<String> {
    let rules: [(bool, &str); 7] = [
        (
            (m.central_incisors_wl_ratio - 78.0).abs() > 12.0,
            "→ Cosmetic/Prosthodontic: Veneers, crowns, or composite restorations to achieve W/L ratio optimization",
        ),
        (
            m.gingival_symmetry < 80.0,
            "→ Periodontics: Gingival contouring, osseous contouring, or gingivectomy for symmetry",
        ),
        (
            m.midline_deviation.abs() > 1.5,
            "→ Orthodontics: Anterior tooth repositioning for midline alignment",
        ),
        (
            m.smile_fullness < 60.0,
            "→ Prosthodontics/Orthodontics: Vertical dimension adjustment; evaluate posterior support",
        ),
        (
            m.smile_fullness > 100.0,
            "→ Periodontics/Oral Surgery: Gingival contouring or lip repositioning for excess display",
        ),
        (
            m.buccal_corridors > 4.5,
            "→ Implant/Orthodontic: Buccal corridor reduction via implants or orthodontic smile expansion",
        ),
        (
            (m.golden_ratio_lateral - 62.0).abs() > 10.0,
            "→ Cosmetic Dentistry: Lateral incisor width adjustment via veneers or orthodontics",
        ),
    ];

    let out: Vec<String> = rules
        .iter()
        .filter(|(fired, _)| *fired)
        .map(|(_, text)| text.to_string())
        .collect();
    if out.is_empty() {
        vec![MAINTENANCE.to_string()]
    } else {
        out
    }
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "⚠"
    }
}

fn soft_mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "△"
    }
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n═══ {title} ═══");
}

/// Render the full clinical report for one analysis.
pub fn render_report(analysis: &AnalysisResult, generated_at: NaiveDateTime) -> String {
    let m = &analysis.measurements;
    let rule = "═".repeat(RULE_WIDTH);
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "LUMINA ULTRA - CLINICAL DSD ANALYSIS REPORT");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Platform Version: {REPORT_VERSION} Clinical Grade");

    section(&mut out, "OVERALL HARMONY SCORE");
    let _ = writeln!(
        out,
        "{}/100 {}",
        analysis.overall_harmony,
        harmony_grade(analysis.overall_harmony)
    );

    section(&mut out, "SMILE CLASSIFICATION");
    let _ = writeln!(out, "{}", analysis.classification_notes);

    section(&mut out, "FACIAL ANALYSIS");
    let _ = writeln!(out, "• Facial Midline Deviation: {:.2}mm", m.facial_midline_deviation);
    let _ = writeln!(
        out,
        "  (Clinical threshold: <2mm) {}",
        mark(m.facial_midline_deviation < 2.0)
    );
    let _ = writeln!(out, "• Inter-Pupillary Reference: Established");

    section(&mut out, "DENTAL ANALYSIS");
    let _ = writeln!(out, "• Central Incisor W/L Ratio: {:.1}%", m.central_incisors_wl_ratio);
    let _ = writeln!(out, "  Ideal Range: 75-80% (Clinical Standard)");
    let _ = writeln!(
        out,
        "  Status: {}",
        if (m.central_incisors_wl_ratio - 78.0).abs() <= 5.0 {
            "✓ IDEAL"
        } else {
            "△ DEVIATION"
        }
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "• Dental Midline Deviation: {:.2}mm from facial midline",
        m.midline_deviation
    );
    let _ = writeln!(out, "  Clinical threshold: <1.5mm {}", mark(m.midline_deviation < 1.5));

    section(&mut out, "GOLDEN PROPORTION ANALYSIS");
    let _ = writeln!(out, "(Peer-reviewed DSD protocol: Preston & Forster proportions)");
    let _ = writeln!(out);
    let _ = writeln!(out, "• Lateral/Central Incisor Ratio: {:.1}%", m.golden_ratio_lateral);
    let _ = writeln!(out, "  Ideal: 62% (Range: 54-66% clinically acceptable)");
    let _ = writeln!(
        out,
        "  Status: {}",
        soft_mark((m.golden_ratio_lateral - 62.0).abs() <= 8.0)
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "• Canine/Lateral Incisor Ratio: {:.1}%", m.golden_ratio_canine);
    let _ = writeln!(out, "  Ideal: 62% (Range: 54-66% clinically acceptable)");
    let _ = writeln!(
        out,
        "  Status: {}",
        soft_mark((m.golden_ratio_canine - 62.0).abs() <= 8.0)
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "• RED (Recurring Esthetic Dental) Proportion: {:.1}%",
        m.red_proportion
    );
    let _ = writeln!(out, "  Acceptable Range: 62-80% (Ward, 2001)");
    let _ = writeln!(
        out,
        "  Status: {}",
        if (62.0..=80.0).contains(&m.red_proportion) {
            "✓ WITHIN RANGE"
        } else {
            "⚠ OUTSIDE RANGE"
        }
    );

    section(&mut out, "GINGIVAL ANALYSIS");
    let _ = writeln!(out, "• Bilateral Symmetry Score: {:.1}/100", m.gingival_symmetry);
    let _ = writeln!(out, "  Clinical threshold: >85% {}", mark(m.gingival_symmetry > 85.0));
    let _ = writeln!(out);
    let _ = writeln!(out, "• Gingival Margin Deviations (mm):");
    for (i, d) in m.gingival_margin_dev.iter().enumerate() {
        let _ = writeln!(out, "    Tooth {}: {:.2}mm", i + 1, d);
    }

    section(&mut out, "SMILE CHARACTERISTICS");
    let _ = writeln!(
        out,
        "• Smile Arc Deviation Score: {:.0}/100",
        100.0 - m.smile_arc_deviation.min(50.0)
    );
    let _ = writeln!(out, "  (Should follow lower lip curve)");
    let _ = writeln!(out);
    let _ = writeln!(out, "• Smile Fullness: {:.1}%", m.smile_fullness);
    let fullness_class = if m.smile_fullness > 80.0 {
        "High/Gummy Smile"
    } else if m.smile_fullness < 50.0 {
        "Low Smile"
    } else {
        "Normal Smile"
    };
    let _ = writeln!(out, "  Classification: {fullness_class}");
    let _ = writeln!(out, "  {}", mark((50.0..=80.0).contains(&m.smile_fullness)));
    let _ = writeln!(out);
    let _ = writeln!(out, "• Buccal Corridors: {:.2}mm", m.buccal_corridors);
    let _ = writeln!(out, "  Ideal Range: 2-4mm (Tooth visibility optimization)");
    let _ = writeln!(
        out,
        "  Status: {}",
        if (2.0..=4.0).contains(&m.buccal_corridors) {
            "✓ IDEAL"
        } else {
            "△ ADJUSTMENT SUGGESTED"
        }
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "• Canine Position Deviation: {:.2}mm", m.canine_position_dev);
    let _ = writeln!(out, "  (Should be at smile corner)");
    let _ = writeln!(out);
    let _ = writeln!(out, "• Intercanine Width: {:.1}mm", m.intercanine_width);

    section(&mut out, "TOOTH INCLINATION");
    let _ = writeln!(out, "(Ideal: ~0° from vertical for anterior teeth)");
    for (i, tilt) in m.tooth_tilt.iter().enumerate() {
        let _ = writeln!(out, "• Tooth {i}: {tilt:.1}° from vertical {}", mark(*tilt < 10.0));
    }
    let _ = writeln!(out, "• Occlusal Plane Cant: {:.1}°", m.occlusal_plane_cant);
    let _ = writeln!(out, "  Clinical threshold: <2° {}", mark(m.occlusal_plane_cant <= 2.0));
    let edges: Vec<String> = m
        .incisor_edge_positions
        .iter()
        .map(|e| format!("{e:.2}"))
        .collect();
    let _ = writeln!(out, "• Incisor Edge Positions (mm): {}", edges.join(", "));

    section(&mut out, "VERTICAL DIMENSION & LIP SUPPORT");
    let _ = writeln!(out, "• VDO Ratio: {:.1}%", m.vertical_dimension_ratio);
    let _ = writeln!(
        out,
        "  Ideal: 43-45% {}",
        mark((42.0..=48.0).contains(&m.vertical_dimension_ratio))
    );
    let _ = writeln!(out, "• Lip Support Score: {:.1}/100", m.lip_support_score);
    let _ = writeln!(
        out,
        "  Profile Analysis: {}",
        if m.profile_analysis_needed {
            "Recommended"
        } else {
            "Not required"
        }
    );
    let _ = writeln!(out, "• Smile Convexity Score: {:.1}/100", m.smile_convexity_score);
    let _ = writeln!(out, "• Tooth Visibility at Rest: {:.1}%", m.tooth_visibility_at_rest);
    let _ = writeln!(out, "• Smile Animation Pathway: {}", m.smile_animation_pathway);

    section(&mut out, "MEASUREMENT CONFIDENCE");
    for (metric, pct) in &analysis.measurement_confidence {
        let _ = writeln!(out, "• {metric}: {pct}%");
    }

    section(&mut out, "CLINICAL RECOMMENDATIONS");
    for (i, rec) in analysis.clinical_recommendations.iter().enumerate() {
        let _ = writeln!(out, "{}. {rec}", i + 1);
    }

    section(&mut out, "TREATMENT PLAN SUGGESTIONS");
    for line in treatment_suggestions(m) {
        let _ = writeln!(out, "{line}");
    }

    section(&mut out, "CLINICAL NOTES");
    let _ = writeln!(
        out,
        "This analysis is based on peer-reviewed DSD protocols and validated against:"
    );
    let _ = writeln!(out, "• Snow's Golden Percentage (1999)");
    let _ = writeln!(out, "• Ward's RED Proportion (2001)");
    let _ = writeln!(out, "• Preston proportions");
    let _ = writeln!(out, "• Peer-reviewed literature on smile esthetics");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "⚠ DISCLAIMER: This tool is a clinical aid. Professional examination and"
    );
    let _ = writeln!(
        out,
        "patient assessment are essential. Use in conjunction with clinical judgment."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "End of Report | Lumina Ultra™ v{REPORT_VERSION}");
    let _ = writeln!(out, "{rule}");

    out
}

/// Download file name for a report generated at `unix_ms`.
pub fn report_file_name(unix_ms: i64) -> String {
    format!("lumina-dsd-report-{unix_ms}.txt")
}
