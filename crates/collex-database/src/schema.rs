//! 数据库表结构

use collex_core::Result;

use crate::connection::{db_err, DatabasePool};

/// 建表语句，按依赖顺序执行
const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        first_name VARCHAR(100) NOT NULL,
        last_name VARCHAR(100) NOT NULL DEFAULT '',
        email VARCHAR(255) UNIQUE NOT NULL,
        role VARCHAR(20) NOT NULL DEFAULT 'normal',
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS doctors (
        id UUID PRIMARY KEY,
        user_id UUID UNIQUE NOT NULL REFERENCES users(id),
        specialization VARCHAR(255),
        consultation_fee NUMERIC(12, 2) NOT NULL DEFAULT 0,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pharmacies (
        id UUID PRIMARY KEY,
        user_id UUID UNIQUE NOT NULL REFERENCES users(id),
        name VARCHAR(255) NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS medicines (
        id UUID PRIMARY KEY,
        pharmacy_id UUID NOT NULL REFERENCES pharmacies(id),
        name VARCHAR(255) NOT NULL,
        price NUMERIC(12, 2) NOT NULL CHECK (price >= 0),
        stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS appointments (
        id UUID PRIMARY KEY,
        booking_id UUID NOT NULL,
        doctor_id UUID NOT NULL REFERENCES doctors(id),
        patient_id UUID NOT NULL REFERENCES users(id),
        reason TEXT NOT NULL,
        mode VARCHAR(10) NOT NULL CHECK (mode IN ('online', 'offline')),
        status VARCHAR(20) NOT NULL DEFAULT 'pending',
        date DATE NOT NULL,
        time VARCHAR(5) NOT NULL,
        duration_minutes INTEGER NOT NULL DEFAULT 30,
        consultation_fee NUMERIC(12, 2) NOT NULL DEFAULT 0,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
        confirmed_at TIMESTAMP WITH TIME ZONE,
        cancelled_at TIMESTAMP WITH TIME ZONE,
        cancelled_by UUID,
        cancellation_reason TEXT,
        completed_at TIMESTAMP WITH TIME ZONE,
        diagnosis TEXT,
        prescription TEXT,
        doctor_notes TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS doctor_availability (
        doctor_id UUID NOT NULL REFERENCES doctors(id),
        date DATE NOT NULL,
        time VARCHAR(5) NOT NULL,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
        PRIMARY KEY (doctor_id, date, time)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS carts (
        id UUID PRIMARY KEY,
        user_id UUID UNIQUE NOT NULL REFERENCES users(id),
        total_amount NUMERIC(12, 2) NOT NULL DEFAULT 0,
        updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cart_medicines (
        cart_id UUID NOT NULL REFERENCES carts(id) ON DELETE CASCADE,
        medicine_id UUID NOT NULL REFERENCES medicines(id),
        quantity INTEGER NOT NULL CHECK (quantity >= 1),
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
        UNIQUE (cart_id, medicine_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payments (
        id UUID PRIMARY KEY,
        order_id VARCHAR(40) UNIQUE NOT NULL,
        razorpay_order_id VARCHAR(64) UNIQUE,
        user_id UUID NOT NULL REFERENCES users(id),
        cart_id UUID REFERENCES carts(id),
        amount NUMERIC(12, 2) NOT NULL CHECK (amount > 0),
        currency VARCHAR(3) NOT NULL DEFAULT 'INR',
        status VARCHAR(20) NOT NULL DEFAULT 'pending',
        razorpay_payment_id VARCHAR(64),
        razorpay_signature VARCHAR(128),
        method VARCHAR(32),
        failure_reason TEXT,
        delivery_address TEXT NOT NULL DEFAULT '',
        notes TEXT,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id UUID PRIMARY KEY,
        order_number VARCHAR(32) UNIQUE NOT NULL,
        user_id UUID NOT NULL REFERENCES users(id),
        payment_id UUID UNIQUE NOT NULL REFERENCES payments(id),
        pharmacy_id UUID NOT NULL REFERENCES pharmacies(id),
        total_amount NUMERIC(12, 2) NOT NULL,
        status VARCHAR(20) NOT NULL DEFAULT 'confirmed',
        delivery_address TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_items (
        id UUID PRIMARY KEY,
        order_id UUID NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        medicine_id UUID NOT NULL REFERENCES medicines(id),
        pharmacy_id UUID NOT NULL REFERENCES pharmacies(id),
        quantity INTEGER NOT NULL CHECK (quantity >= 1),
        price NUMERIC(12, 2) NOT NULL,
        subtotal NUMERIC(12, 2) NOT NULL
    )
    "#,
];

const INDEXES: &[&str] = &[
    // 同一医生同一时段最多一个未取消的预约
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_appointments_active_slot ON appointments(doctor_id, date, time) WHERE status <> 'cancelled'",
    "CREATE INDEX IF NOT EXISTS idx_appointments_doctor_date ON appointments(doctor_id, date, time)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_patient_date ON appointments(patient_id, date, time)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_booking_id ON appointments(booking_id)",
    "CREATE INDEX IF NOT EXISTS idx_payments_user_id ON payments(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_payments_provisional ON payments(created_at) WHERE razorpay_order_id IS NULL",
    "CREATE INDEX IF NOT EXISTS idx_orders_user_id ON orders(user_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_order_items_order_id ON order_items(order_id)",
    "CREATE INDEX IF NOT EXISTS idx_order_items_pharmacy_id ON order_items(pharmacy_id)",
    "CREATE INDEX IF NOT EXISTS idx_medicines_pharmacy_id ON medicines(pharmacy_id)",
];

/// 创建数据库表和索引
pub async fn migrate(db: &DatabasePool) -> Result<()> {
    let pool = db.pool();

    for table_sql in TABLES {
        sqlx::query(table_sql).execute(pool).await.map_err(db_err)?;
    }
    tracing::info!("Database tables created successfully");

    for index_sql in INDEXES {
        sqlx::query(index_sql).execute(pool).await.map_err(db_err)?;
    }
    tracing::info!("Database indexes created successfully");

    Ok(())
}
