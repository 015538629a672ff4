//! Demo data: departments, modules with their permission definitions,
//! roles with grants, and a handful of users covering single-role,
//! multi-role and read-only principals.

use std::collections::BTreeMap;

use adminkit_auth::{
    Codename, GrantEntry, NewDepartment, NewModule, NewPermissionDefinition, NewRole, NewUser, PermissionCategory,
};
use adminkit_core::{DepartmentId, DomainError, DomainResult, ModuleId, RoleId};

use crate::store::ConsoleStore;

/// Counts of what [`seed_demo_data`] created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub departments: usize,
    pub modules: usize,
    pub definitions: usize,
    pub roles: usize,
    pub users: usize,
}

/// Which codenames a role receives on a module.
enum Grant {
    All,
    Only(&'static [&'static str]),
}

struct ModuleSeed {
    name: &'static str,
    icon: &'static str,
    path: &'static str,
    order: i32,
    extras: &'static [(&'static str, &'static str, PermissionCategory, i32)],
}

struct RoleSeed {
    name: &'static str,
    description: &'static str,
    department: Option<&'static str>,
    grants: &'static [(&'static str, Grant)],
}

struct UserSeed {
    username: &'static str,
    email: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    employee_id: &'static str,
    department: &'static str,
    roles: &'static [&'static str],
}

const DEPARTMENTS: &[(&str, &str, &str)] = &[
    ("IT", "IT", "Information Technology"),
    ("HR", "HR", "Human Resources"),
    ("Sales", "SALES", "Sales and Business Development"),
    ("Finance", "FIN", "Finance and Accounting"),
];

const MODULES: &[ModuleSeed] = &[
    ModuleSeed {
        name: "Dashboard",
        icon: "dashboard",
        path: "/dashboard",
        order: 1,
        extras: &[
            ("view_revenue_card", "View Revenue Card", PermissionCategory::Component, 10),
            ("view_analytics", "View Analytics", PermissionCategory::Component, 11),
            ("view_user_stats", "View User Stats", PermissionCategory::Component, 12),
            ("view_recent_activity", "View Recent Activity", PermissionCategory::Component, 13),
        ],
    },
    ModuleSeed {
        name: "Users",
        icon: "user",
        path: "/users",
        order: 2,
        extras: &[
            ("view_email", "View Email", PermissionCategory::Column, 10),
            ("view_phone", "View Phone", PermissionCategory::Column, 11),
            ("view_salary", "View Salary", PermissionCategory::Column, 12),
            ("export_csv", "Export CSV", PermissionCategory::Action, 20),
            ("export_pdf", "Export PDF", PermissionCategory::Action, 21),
            ("reset_password", "Reset Password", PermissionCategory::Action, 22),
        ],
    },
    ModuleSeed {
        name: "Roles",
        icon: "shield",
        path: "/roles",
        order: 3,
        extras: &[("assign_permissions", "Assign Permissions", PermissionCategory::Action, 10)],
    },
    ModuleSeed {
        name: "Departments",
        icon: "building",
        path: "/departments",
        order: 4,
        extras: &[],
    },
    ModuleSeed {
        name: "Modules",
        icon: "modules",
        path: "/modules",
        order: 5,
        extras: &[("manage_permissions", "Manage Permissions", PermissionCategory::Action, 10)],
    },
];

const ROLES: &[RoleSeed] = &[
    RoleSeed {
        name: "Super Admin",
        description: "Full access to every module",
        department: None,
        grants: &[
            ("Dashboard", Grant::All),
            ("Users", Grant::All),
            ("Roles", Grant::All),
            ("Departments", Grant::All),
            ("Modules", Grant::All),
        ],
    },
    RoleSeed {
        name: "IT Manager",
        description: "Manages IT users, roles and modules",
        department: Some("IT"),
        grants: &[
            (
                "Dashboard",
                Grant::Only(&["view", "view_revenue_card", "view_analytics", "view_user_stats", "view_recent_activity"]),
            ),
            (
                "Users",
                Grant::Only(&["view", "add", "edit", "delete", "view_email", "view_phone", "export_csv"]),
            ),
            ("Roles", Grant::Only(&["view", "add", "edit", "assign_permissions"])),
            ("Modules", Grant::Only(&["view", "add", "edit", "manage_permissions"])),
        ],
    },
    RoleSeed {
        name: "IT Developer",
        description: "Read access to IT tooling",
        department: Some("IT"),
        grants: &[
            ("Dashboard", Grant::Only(&["view", "view_analytics", "view_recent_activity"])),
            ("Users", Grant::Only(&["view", "view_email"])),
            ("Modules", Grant::Only(&["view"])),
        ],
    },
    RoleSeed {
        name: "HR Manager",
        description: "Manages employees and departments",
        department: Some("HR"),
        grants: &[
            ("Dashboard", Grant::Only(&["view", "view_user_stats", "view_recent_activity"])),
            (
                "Users",
                Grant::Only(&[
                    "view",
                    "add",
                    "edit",
                    "view_email",
                    "view_phone",
                    "view_salary",
                    "export_csv",
                    "export_pdf",
                    "reset_password",
                ]),
            ),
            ("Departments", Grant::Only(&["view", "add", "edit"])),
        ],
    },
    RoleSeed {
        name: "HR Staff",
        description: "Looks up employee records",
        department: Some("HR"),
        grants: &[
            ("Dashboard", Grant::Only(&["view", "view_user_stats"])),
            ("Users", Grant::Only(&["view", "view_email", "view_phone"])),
            ("Departments", Grant::Only(&["view"])),
        ],
    },
    RoleSeed {
        name: "Sales Manager",
        description: "Manages the sales team",
        department: Some("SALES"),
        grants: &[
            ("Dashboard", Grant::Only(&["view", "view_revenue_card", "view_recent_activity"])),
            ("Users", Grant::Only(&["view", "add", "edit", "view_email", "view_phone"])),
        ],
    },
    RoleSeed {
        name: "Viewer",
        description: "Read-only access",
        department: None,
        grants: &[
            ("Dashboard", Grant::Only(&["view"])),
            ("Users", Grant::Only(&["view"])),
            ("Roles", Grant::Only(&["view"])),
            ("Departments", Grant::Only(&["view"])),
        ],
    },
];

const USERS: &[UserSeed] = &[
    UserSeed {
        username: "superadmin",
        email: "superadmin@neuracraft.com",
        first_name: "Super",
        last_name: "Admin",
        employee_id: "EMP001",
        department: "IT",
        roles: &["Super Admin"],
    },
    UserSeed {
        username: "john_it",
        email: "john@neuracraft.com",
        first_name: "John",
        last_name: "Sharma",
        employee_id: "EMP002",
        department: "IT",
        roles: &["IT Manager"],
    },
    UserSeed {
        username: "mike_dev",
        email: "mike@neuracraft.com",
        first_name: "Mike",
        last_name: "Patel",
        employee_id: "EMP003",
        department: "IT",
        roles: &["IT Developer"],
    },
    UserSeed {
        username: "sarah_hr",
        email: "sarah@neuracraft.com",
        first_name: "Sarah",
        last_name: "Verma",
        employee_id: "EMP004",
        department: "HR",
        roles: &["HR Manager"],
    },
    UserSeed {
        username: "lisa_hr",
        email: "lisa@neuracraft.com",
        first_name: "Lisa",
        last_name: "Singh",
        employee_id: "EMP005",
        department: "HR",
        roles: &["HR Staff"],
    },
    UserSeed {
        username: "tom_sales",
        email: "tom@neuracraft.com",
        first_name: "Tom",
        last_name: "Gupta",
        employee_id: "EMP006",
        department: "SALES",
        roles: &["Sales Manager"],
    },
    UserSeed {
        username: "viewer1",
        email: "viewer@neuracraft.com",
        first_name: "Guest",
        last_name: "Viewer",
        employee_id: "EMP007",
        department: "FIN",
        roles: &["Viewer"],
    },
    UserSeed {
        username: "multi_role",
        email: "multi@neuracraft.com",
        first_name: "Arjun",
        last_name: "Mehta",
        employee_id: "EMP008",
        department: "IT",
        roles: &["IT Developer", "HR Staff"],
    },
    UserSeed {
        username: "manager_combo",
        email: "combo@neuracraft.com",
        first_name: "Ravi",
        last_name: "Kumar",
        employee_id: "EMP009",
        department: "IT",
        roles: &["IT Manager", "Sales Manager"],
    },
];

fn lookup<T: Copy>(map: &BTreeMap<&str, T>, key: &str, what: &str) -> DomainResult<T> {
    map.get(key)
        .copied()
        .ok_or_else(|| DomainError::invariant(format!("seed references unknown {what} '{key}'")))
}

/// Populate an empty store with the demo console. Every user gets
/// `password`.
///
/// Not idempotent: running it twice fails on the first duplicate.
pub fn seed_demo_data<S: ConsoleStore + ?Sized>(store: &S, password: &str) -> DomainResult<SeedReport> {
    let mut report = SeedReport::default();

    let mut departments: BTreeMap<&str, DepartmentId> = BTreeMap::new();
    for (name, code, description) in DEPARTMENTS {
        let mut input = NewDepartment::new(*name, *code);
        input.description = description.to_string();
        let department = store.create_department(input)?;
        departments.insert(*code, department.id);
        report.departments += 1;
    }

    let mut modules: BTreeMap<&str, ModuleId> = BTreeMap::new();
    let mut codenames: BTreeMap<ModuleId, Vec<Codename>> = BTreeMap::new();
    for seed in MODULES {
        let mut definitions = NewPermissionDefinition::default_crud();
        definitions.extend(
            seed.extras
                .iter()
                .map(|(codename, label, category, order)| {
                    NewPermissionDefinition::new(*codename, *label, *category).with_order(*order)
                }),
        );
        let module = store.create_module_with_definitions(
            NewModule::new(seed.name, seed.path).icon(seed.icon).order(seed.order),
            definitions,
        )?;
        report.modules += 1;
        report.definitions += module.available_permissions.len();
        codenames.insert(
            module.id,
            module.available_permissions.iter().map(|d| d.codename.clone()).collect(),
        );
        modules.insert(seed.name, module.id);
    }

    let mut roles: BTreeMap<&str, RoleId> = BTreeMap::new();
    for seed in ROLES {
        let mut input = NewRole::new(seed.name).description(seed.description);
        if let Some(code) = seed.department {
            input = input.department(lookup(&departments, code, "department")?);
        }
        let role = store.create_role(input)?;

        let mut entries = Vec::with_capacity(seed.grants.len());
        for (module_name, grant) in seed.grants {
            let module = lookup(&modules, module_name, "module")?;
            let granted: Vec<Codename> = match grant {
                Grant::All => codenames.get(&module).cloned().unwrap_or_default(),
                Grant::Only(names) => names.iter().map(|n| Codename::from(*n)).collect(),
            };
            entries.push(GrantEntry { module_id: module, granted });
        }
        store.replace_role_grants(role.id, &entries)?;
        roles.insert(seed.name, role.id);
        report.roles += 1;
    }

    for seed in USERS {
        let role_ids = seed
            .roles
            .iter()
            .map(|name| lookup(&roles, name, "role"))
            .collect::<DomainResult<Vec<_>>>()?;
        let mut input = NewUser::new(seed.username, seed.email, password)
            .name(seed.first_name, seed.last_name)
            .department(lookup(&departments, seed.department, "department")?)
            .roles(role_ids);
        input.employee_id = Some(seed.employee_id.to_string());
        store.register_user(input)?;
        report.users += 1;
    }

    tracing::info!(
        departments = report.departments,
        modules = report.modules,
        roles = report.roles,
        users = report.users,
        "seeded demo data"
    );
    Ok(report)
}
