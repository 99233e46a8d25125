/*!
The global survey on weather-responsive variable speed limit (WRVSL) systems.

The questionnaire is addressed to practitioners operating or designing WRVSL
systems. All the answers are anonymous, except for the optional contact address
in the last section.

Only the first two sections (Participant Context and System Design) hold the
questions of the published survey. The questions of the other sections
([DRAFT_SECTIONS]) are placeholder content, written so that every page can be
filled in and every kind of input is exercised. They are to be replaced by the
questions of the research team before the survey is used.
*/

use crate::builder::Builder;
use crate::config::{FormErrors, Questionnaire};

pub const TITLE: &str = "Global Weather-Responsive VSL Survey";

pub const SECTIONS: [&str; 8] = [
    "Participant Context",
    "System Design",
    "Operational Challenges",
    "Impact Assessment",
    "Lessons Learned",
    "Policy & Governance",
    "Future Directions",
    "Demographics",
];

/// The indices of the sections whose questions are placeholders.
pub const DRAFT_SECTIONS: std::ops::Range<usize> = 2..8;

pub const TOOLTIP_CONTROL_LOGIC: &str =
    "Control logic refers to the algorithmic approach used to determine speed limits";
pub const TOOLTIP_RWIS: &str =
    "Road Weather Information System (RWIS) uses roadside sensors to monitor conditions";
pub const TOOLTIP_MUTCD: &str =
    "Manual on Uniform Traffic Control Devices (MUTCD) - US regulatory framework";

const ABOUT: &str = "This survey collects global insights on weather-responsive VSL systems. \
All responses are anonymized and will be used for academic research.";

const RULE_BASED: &str = "Rule-based thresholds (fixed)";

/// Builds the questionnaire.
pub fn questionnaire() -> Result<Questionnaire, FormErrors> {
    Builder::new(TITLE)
        // Participant Context
        .section(SECTIONS[0])
        .introduction(ABOUT)
        .single_choice(
            "region",
            "1. Geographical region of operation",
            &[
                "North America",
                "Europe",
                "Australia/NZ",
                "Asia",
                "Middle East",
                "Africa",
                "South America",
            ],
        )
        .single_choice(
            "experience",
            "2. Years of experience with WRVSL systems",
            &["<1 year", "1–3 years", "4–7 years", "8+ years"],
        )
        .single_choice(
            "org_type",
            "3. Organization type",
            &[
                "Government agency",
                "Private consultancy",
                "Academic",
                "NGO",
                "Other",
            ],
        )
        .free_text("org_type_other", "Please specify the organization type")
        .only_if("org_type", "Other")
        // System Design
        .section(SECTIONS[1])
        .multi_choice(
            "vsl_types",
            "4. Types of VSL systems managed",
            &[
                "Congestion-responsive",
                "Weather-responsive",
                "Event-specific",
                "Other",
            ],
        )
        .free_text("vsl_types_other", "Please specify the other VSL types")
        .only_if("vsl_types", "Other")
        .multi_choice(
            "weather_params",
            "5. Primary weather parameters triggering adjustments",
            &[
                "Rainfall intensity",
                "Snow accumulation",
                "Pavement friction",
                "Visibility",
                "Wind speed",
                "Humidity",
                "Other",
            ],
        )
        .free_text("weather_params_other", "Please specify the other parameters")
        .only_if("weather_params", "Other")
        .multi_choice(
            "data_sources",
            "6. Rank data sources (select in order, most critical first)",
            &[
                "RWIS/roadside sensors",
                "Connected vehicle telematics",
                "Radar/satellite forecasts",
                "Thermal cameras",
                "Manual operator reports",
            ],
        )
        .help(TOOLTIP_RWIS)
        .single_choice(
            "control_logic",
            "7. Control logic architecture",
            &[
                RULE_BASED,
                "Dynamic thresholds (real-time adjustments)",
                "Machine learning based",
            ],
        )
        .help(TOOLTIP_CONTROL_LOGIC)
        .single_choice(
            "threshold_method",
            "How were thresholds determined?",
            &[
                "Historical crash data",
                "Regulatory guidelines",
                "Trial-and-error",
                "Other",
            ],
        )
        .only_if("control_logic", RULE_BASED)
        .free_text("threshold_method_other", "Please specify how")
        .only_if("threshold_method", "Other")
        // Operational Challenges
        .section(SECTIONS[2])
        .multi_choice(
            "challenges",
            "8. Main operational challenges",
            &[
                "Sensor reliability",
                "Data latency",
                "Driver compliance",
                "Communication failures",
                "Maintenance costs",
                "Inter-agency coordination",
                "Other",
            ],
        )
        .free_text("challenges_other", "Please specify the other challenges")
        .only_if("challenges", "Other")
        .numeric(
            "degraded_data_share",
            "9. Share of operating time with degraded or missing sensor data (%)",
            0.0,
            100.0,
        )
        .single_choice(
            "manual_override",
            "10. How often do operators override the automatic speed limits?",
            &["Never", "Rarely", "Monthly", "Weekly", "Daily"],
        )
        .multi_choice(
            "compliance_measures",
            "11. Measures used to improve driver compliance",
            &[
                "Automated enforcement",
                "Police presence",
                "Dynamic messaging",
                "None",
            ],
        )
        // Impact Assessment
        .section(SECTIONS[3])
        .single_choice(
            "evaluated",
            "12. Has the safety impact of the system been evaluated?",
            &["Yes", "No", "In progress"],
        )
        .multi_choice(
            "evaluation_methods",
            "Which evaluation methods were used?",
            &[
                "Before-after crash analysis",
                "Speed distribution analysis",
                "Simulation",
                "Driver surveys",
                "Other",
            ],
        )
        .only_if("evaluated", "Yes")
        .numeric(
            "crash_reduction",
            "Estimated reduction of weather-related crashes (%)",
            0.0,
            100.0,
        )
        .only_if("evaluated", "Yes")
        .single_choice(
            "speed_compliance",
            "13. Typical compliance with the displayed speed limits",
            &["<50%", "50–70%", "70–90%", ">90%", "Unknown"],
        )
        // Lessons Learned
        .section(SECTIONS[4])
        .free_text("success_factors", "14. Key factors behind successful deployment")
        .free_text("pitfalls", "15. Pitfalls you would warn other agencies about")
        .single_choice(
            "would_recommend",
            "16. Would you recommend WRVSL to a similar agency?",
            &["Yes", "No", "With reservations"],
        )
        .free_text("reservations", "What are your reservations?")
        .only_if("would_recommend", "With reservations")
        // Policy & Governance
        .section(SECTIONS[5])
        .single_choice(
            "legal_status",
            "17. Legal status of the displayed limits",
            &[
                "Enforceable limits",
                "Advisory limits only",
                "Mixed",
                "Not sure",
            ],
        )
        .single_choice(
            "regulatory_guidance",
            "18. Main regulatory guidance followed",
            &[
                "MUTCD",
                "National guidelines",
                "Agency-specific",
                "None",
            ],
        )
        .help(TOOLTIP_MUTCD)
        .multi_choice(
            "public_communication",
            "19. Channels used to inform the public",
            &[
                "Website",
                "Social media",
                "Variable message signs",
                "Radio",
                "None",
            ],
        )
        // Future Directions
        .section(SECTIONS[6])
        .multi_choice(
            "planned_upgrades",
            "20. Planned upgrades",
            &[
                "Connected vehicle integration",
                "Machine learning control",
                "Additional RWIS stations",
                "Corridor expansion",
                "None planned",
                "Other",
            ],
        )
        .help(TOOLTIP_RWIS)
        .free_text("planned_upgrades_other", "Please specify the other upgrades")
        .only_if("planned_upgrades", "Other")
        .numeric(
            "cav_readiness",
            "21. Readiness to integrate connected and automated vehicles (1 = not ready, 5 = fully ready)",
            1.0,
            5.0,
        )
        .free_text("research_needs", "22. Most pressing research needs")
        // Demographics
        .section(SECTIONS[7])
        .single_choice(
            "role",
            "23. Current role",
            &[
                "Engineer",
                "Operator",
                "Manager",
                "Researcher",
                "Policy maker",
                "Other",
            ],
        )
        .free_text("role_other", "Please specify your role")
        .only_if("role", "Other")
        .single_choice(
            "education",
            "24. Highest degree",
            &["Bachelor", "Master", "Doctorate", "Other"],
        )
        .single_choice(
            "contact_consent",
            "25. May we contact you about the results?",
            &["Yes", "No"],
        )
        .free_text("contact_email", "Contact e-mail")
        .only_if("contact_consent", "Yes")
        .build()
}
