//! Default degrow workflow, seeded into an empty catalog.

use super::workflow::Criticality;

/// Milestones in the order a site moves through them.
pub const DEFAULT_MILESTONES: [&str; 12] = [
    "Create Grooming Workbook Tool",
    "Restrict CM",
    "Complete Pre-Cut",
    "Collect Switch Device Info",
    "RUN TMART Report",
    "Create Bash Report",
    "Verify Bash Report",
    "Complete Bash Report Cleanup",
    "Create Workbook for Order Sets",
    "Issue Switch Special Orders",
    "Create WFA Orders for Switch Specialists",
    "Complete Special Orders",
];

/// Site-level subtasks tracked under every default milestone.
pub const DEFAULT_SUBTASKS: [(&str, Criticality); 12] = [
    ("CLLI Validation", Criticality::MustComplete),
    ("Site Survey", Criticality::MustComplete),
    ("Equipment Inventory", Criticality::ShouldComplete),
    ("Network Analysis", Criticality::MustComplete),
    ("Capacity Planning", Criticality::ShouldComplete),
    ("Risk Assessment", Criticality::MustComplete),
    ("Documentation Review", Criticality::NonBlocking),
    ("Approval Process", Criticality::MustComplete),
    ("Implementation Planning", Criticality::ShouldComplete),
    ("Testing Protocol", Criticality::MustComplete),
    ("Deployment Strategy", Criticality::ShouldComplete),
    ("Go-Live Support", Criticality::MustComplete),
];
